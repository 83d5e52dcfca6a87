//! Repository structure extraction
//!
//! Walks a checked-out tree under an include/exclude policy, reads metadata
//! files, locates entry points, and builds a package-level import graph.
//! Function bodies are never read and nothing is executed; inferred items
//! carry capped confidence and nothing is fabricated.

use archdraft_core::{DiagramId, Error, Result};
use archdraft_ir::{
    normalize_id, DiagramIr, DiagramType, Edge, Node, NodeType, RelType,
};
use globset::{Glob, GlobSet, GlobSetBuilder};
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Confidence ceiling for anything inferred from structure alone.
const INFERRED_CONFIDENCE: f64 = 0.7;

const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "dist",
    "build",
    ".git",
    "target",
    "__pycache__",
    "test",
    "tests",
    "__tests__",
    "spec",
];

const SOURCE_EXTENSIONS: &[&str] = &["rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "rb"];

/// Integrations recognized only when a manifest or config names them.
const KNOWN_INTEGRATIONS: &[&str] = &[
    "postgres", "mysql", "sqlite", "mongodb", "redis", "kafka", "rabbitmq", "elasticsearch",
    "s3", "stripe", "twilio", "sendgrid",
];

#[derive(Clone, Debug, Serialize)]
pub struct RepoStructure {
    pub name: String,
    pub packages: Vec<String>,
    pub entry_points: Vec<String>,
    pub metadata_files: Vec<String>,
    pub integrations: Vec<String>,
    pub import_edges: Vec<(String, String)>,
    pub is_cyclic: bool,
    pub tree: Vec<String>,
}

impl RepoStructure {
    pub fn to_result_json(&self, ir: &DiagramIr) -> Value {
        json!({
            "name": self.name,
            "packages": self.packages,
            "entry_points": self.entry_points,
            "metadata_files": self.metadata_files,
            "integrations": self.integrations,
            "is_cyclic": self.is_cyclic,
            "tree": self.tree,
            "ir": ir,
        })
    }
}

fn excluded_set() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for dir in EXCLUDED_DIRS {
        // match the directory at any depth
        if let Ok(glob) = Glob::new(&format!("**/{}/**", dir)) {
            builder.add(glob);
        }
        if let Ok(glob) = Glob::new(&format!("{}/**", dir)) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Walk the tree and derive its structure.
pub fn extract_structure(root: &Path, repo_name: &str) -> Result<RepoStructure> {
    if !root.is_dir() {
        return Err(Error::IngestFailed(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    let excluded = excluded_set();
    let import_re = Regex::new(
        r#"(?m)^\s*(?:use\s+([a-zA-Z_][a-zA-Z0-9_]*)|import\s+([a-zA-Z_][a-zA-Z0-9_.]*)|from\s+([a-zA-Z_][a-zA-Z0-9_.]*)\s+import|(?:const|let|var)?.*require\(['"]([^'"]+)['"]\))"#,
    )
    .map_err(|e| Error::internal(e.to_string()))?;

    let mut metadata_files: Vec<String> = Vec::new();
    let mut entry_points: Vec<String> = Vec::new();
    let mut tree: BTreeSet<String> = BTreeSet::new();
    // package -> set of modules it imports (by raw name)
    let mut package_imports: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut packages: BTreeSet<String> = BTreeSet::new();
    let mut manifest_text = String::new();

    for entry in WalkDir::new(root).follow_links(false).into_iter().flatten() {
        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        if excluded.is_match(rel_str.as_str()) {
            continue;
        }

        if entry.file_type().is_dir() {
            if rel.components().count() <= 2 {
                tree.insert(format!("{}/", rel_str));
            }
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        if rel.components().count() <= 2 {
            tree.insert(rel_str.clone());
        }

        if is_metadata_file(&file_name) || rel_str.starts_with(".github/workflows/") {
            metadata_files.push(rel_str.clone());
            if let Ok(text) = std::fs::read_to_string(entry.path()) {
                manifest_text.push_str(&text.to_ascii_lowercase());
                manifest_text.push('\n');
            }
            continue;
        }

        let extension = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        if !SOURCE_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }

        if is_entry_point(&file_name) {
            entry_points.push(rel_str.clone());
        }

        let package = package_of(&rel_str, repo_name);
        packages.insert(package.clone());

        // imports only: the scan reads lines, never parses bodies into
        // anything deeper than module names
        if let Ok(text) = std::fs::read_to_string(entry.path()) {
            let imports = package_imports.entry(package).or_default();
            for cap in import_re.captures_iter(&text) {
                for group in 1..=4 {
                    if let Some(m) = cap.get(group) {
                        let target = m
                            .as_str()
                            .split(['.', '/', ':'])
                            .next()
                            .unwrap_or("")
                            .to_string();
                        if !target.is_empty() {
                            imports.insert(target);
                        }
                    }
                }
            }
        }
    }

    // package-level import graph: an edge only where the imported name is
    // itself a package in this repository
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for package in &packages {
        graph.add_node(package.as_str());
    }
    let mut import_edges: Vec<(String, String)> = Vec::new();
    for (from, imports) in &package_imports {
        for target in imports {
            let target_pkg = packages
                .iter()
                .find(|p| p.as_str() == target.as_str() || normalize_id(p) == normalize_id(target));
            if let Some(to) = target_pkg {
                if to != from {
                    graph.add_edge(from.as_str(), to.as_str(), ());
                    import_edges.push((from.clone(), to.clone()));
                }
            }
        }
    }
    let is_cyclic = is_cyclic_directed(&graph);

    let integrations: Vec<String> = KNOWN_INTEGRATIONS
        .iter()
        .filter(|name| manifest_text.contains(*name))
        .map(|s| s.to_string())
        .collect();

    import_edges.sort();
    import_edges.dedup();
    entry_points.sort();
    metadata_files.sort();

    debug!(
        packages = packages.len(),
        edges = import_edges.len(),
        cyclic = is_cyclic,
        "structure extracted"
    );

    Ok(RepoStructure {
        name: repo_name.to_string(),
        packages: packages.into_iter().collect(),
        entry_points,
        metadata_files,
        integrations,
        import_edges,
        is_cyclic,
        tree: tree.into_iter().collect(),
    })
}

/// Project the structure onto a container diagram IR. Every inferred node
/// carries confidence below 0.8 and a reason; nothing is invented beyond
/// what the tree and manifests show.
pub fn structure_to_ir(structure: &RepoStructure) -> DiagramIr {
    let mut ir = DiagramIr::initial(DiagramId::generate(), DiagramType::Container);

    for package in &structure.packages {
        let node_id = normalize_id(package);
        if node_id.is_empty() || ir.has_node(&node_id) {
            continue;
        }
        let mut node = Node::new(node_id, package.clone(), NodeType::Container);
        node.role = Some("package".to_string());
        node.confidence = INFERRED_CONFIDENCE;
        ir.nodes.push(node);
    }

    for integration in &structure.integrations {
        let node_id = normalize_id(integration);
        if node_id.is_empty() || ir.has_node(&node_id) {
            continue;
        }
        let node_type = if is_data_store(integration) {
            NodeType::DataStore
        } else {
            NodeType::External
        };
        let mut node = Node::new(node_id, integration.clone(), node_type);
        node.role = Some("integration".to_string());
        node.confidence = 0.6;
        ir.nodes.push(node);
    }

    let mut edge_index = 0usize;
    for (from, to) in &structure.import_edges {
        let from_id = normalize_id(from);
        let to_id = normalize_id(to);
        if !ir.has_node(&from_id) || !ir.has_node(&to_id) {
            continue;
        }
        edge_index += 1;
        let mut edge = Edge::new(
            format!("imports_{}", edge_index),
            from_id,
            to_id,
            RelType::Sync,
        );
        edge.label = "imports".to_string();
        edge.confidence = INFERRED_CONFIDENCE;
        edge.reason = Some("package-level import".to_string());
        ir.edges.push(edge);
    }

    if structure.is_cyclic {
        ir.metadata
            .validation_warnings
            .push("import graph is cyclic".to_string());
    }
    ir
}

fn is_metadata_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("readme")
        || lower.starts_with("dockerfile")
        || lower.starts_with("docker-compose")
        || matches!(
            lower.as_str(),
            "cargo.toml"
                | "package.json"
                | "pyproject.toml"
                | "requirements.txt"
                | "go.mod"
                | "pom.xml"
                | "build.gradle"
                | "gemfile"
                | "makefile"
        )
}

fn is_entry_point(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "main.rs" | "main.py" | "main.go" | "main.ts" | "main.js" | "index.ts" | "index.js"
            | "app.py" | "app.ts" | "app.js" | "server.py" | "server.ts" | "server.js"
    )
}

fn is_data_store(name: &str) -> bool {
    matches!(
        name,
        "postgres" | "mysql" | "sqlite" | "mongodb" | "redis" | "elasticsearch"
    )
}

fn package_of(rel_path: &str, repo_name: &str) -> String {
    match rel_path.split('/').next() {
        Some(first) if rel_path.contains('/') => first.to_string(),
        _ => repo_name.to_string(),
    }
}
