//! Diagram IR model
//!
//! The IR is the canonical description of one diagram at one point in time.
//! It carries structure and intent only: no coordinates, no colors, no
//! renderer syntax. Aesthetic wishes live in the intent maps as plain words.

use archdraft_core::DiagramId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const IR_SCHEMA_VERSION: &str = "1";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    Context,
    Container,
    Component,
    Sequence,
    Flow,
    Story,
}

impl DiagramType {
    /// Structural types describe static architecture; the rest are temporal.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DiagramType::Context | DiagramType::Container | DiagramType::Component
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramType::Context => "context",
            DiagramType::Container => "container",
            DiagramType::Component => "component",
            DiagramType::Sequence => "sequence",
            DiagramType::Flow => "flow",
            DiagramType::Story => "story",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    System,
    Container,
    Component,
    DataStore,
    External,
    Actor,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelType {
    Sync,
    Async,
    DataFlow,
    Replication,
    SecretDistribution,
    Monitoring,
    Auth,
    Control,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::Sync => "sync",
            RelType::Async => "async",
            RelType::DataFlow => "data_flow",
            RelType::Replication => "replication",
            RelType::SecretDistribution => "secret_distribution",
            RelType::Monitoring => "monitoring",
            RelType::Auth => "auth",
            RelType::Control => "control",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
    Bidirectional,
}

/// Per-dialect rendering hints. Free-form hint words, never syntax.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RenderingHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plantuml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mermaid: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub node_id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_hint: Option<String>,
    /// Relative placement word ("top", "near_gateway"). Never coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_hint: Option<String>,
    #[serde(default)]
    pub rendering_hints: RenderingHints,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,
}

fn default_confidence() -> f64 {
    1.0
}

impl Node {
    pub fn new(node_id: impl Into<String>, label: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            node_id: node_id.into(),
            label: label.into(),
            role: None,
            zone: None,
            node_type,
            shape_hint: None,
            placement_hint: None,
            rendering_hints: RenderingHints::default(),
            confidence: 1.0,
            hidden: false,
            annotations: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub edge_id: String,
    pub from_id: String,
    pub to_id: String,
    pub rel_type: RelType,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Temporal ordinal for sequence/flow/story diagrams. Dropped when a
    /// diagram is converted down to a structural type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
}

impl Edge {
    pub fn new(
        edge_id: impl Into<String>,
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        rel_type: RelType,
    ) -> Self {
        Self {
            edge_id: edge_id.into(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            rel_type,
            direction: Direction::Forward,
            label: String::new(),
            confidence: 1.0,
            reason: None,
            sequence: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Zone {
    pub zone_id: String,
    pub label: String,
}

/// Mood words only; anything resembling concrete CSS fails validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalIntent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palette: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IrMetadata {
    pub created_at: DateTime<Utc>,
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_warnings: Vec<String>,
}

impl Default for IrMetadata {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            schema_version: IR_SCHEMA_VERSION.to_string(),
            validation_warnings: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagramIr {
    pub diagram_id: DiagramId,
    pub version: u64,
    pub parent_version: Option<u64>,
    pub diagram_type: DiagramType,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub zone_order: Vec<String>,
    #[serde(default)]
    pub global_intent: GlobalIntent,
    /// Intent defaults keyed by node role.
    #[serde(default)]
    pub node_intent: BTreeMap<String, Value>,
    /// Intent defaults keyed by rel_type.
    #[serde(default)]
    pub edge_intent: BTreeMap<String, Value>,
    #[serde(default)]
    pub metadata: IrMetadata,
}

impl DiagramIr {
    /// A fresh version-1 IR with no parent.
    pub fn initial(diagram_id: DiagramId, diagram_type: DiagramType) -> Self {
        Self {
            diagram_id,
            version: 1,
            parent_version: None,
            diagram_type,
            nodes: Vec::new(),
            edges: Vec::new(),
            zones: Vec::new(),
            zone_order: Vec::new(),
            global_intent: GlobalIntent::default(),
            node_intent: BTreeMap::new(),
            edge_intent: BTreeMap::new(),
            metadata: IrMetadata::default(),
        }
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.node_id == node_id)
    }

    pub fn edge(&self, edge_id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.edge_id == edge_id)
    }

    pub fn edge_mut(&mut self, edge_id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.edge_id == edge_id)
    }

    pub fn has_node(&self, node_id: &str) -> bool {
        self.node(node_id).is_some()
    }

    /// Nodes grouped for canonical emission: zones in declared `zone_order`
    /// (undeclared zones after, lexicographic), nodes lexicographic by
    /// `node_id` within each zone, zoneless nodes first.
    pub fn canonical_node_order(&self) -> Vec<&Node> {
        let mut zone_rank: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, z) in self.zone_order.iter().enumerate() {
            zone_rank.insert(z.as_str(), i);
        }
        let mut nodes: Vec<&Node> = self.nodes.iter().collect();
        nodes.sort_by(|a, b| {
            let ra = zone_key(a, &zone_rank);
            let rb = zone_key(b, &zone_rank);
            ra.cmp(&rb).then_with(|| a.node_id.cmp(&b.node_id))
        });
        nodes
    }

    /// Renderer-independent fingerprint of structure: node ids + labels,
    /// edge triples + labels, sorted. Two renders of the same IR share it.
    pub fn structure_hash(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for n in &self.nodes {
            if !n.hidden {
                lines.push(format!("n:{}:{}", n.node_id, n.label));
            }
        }
        for e in &self.edges {
            lines.push(format!(
                "e:{}:{}:{}:{}",
                e.from_id,
                e.to_id,
                e.rel_type.as_str(),
                e.label
            ));
        }
        lines.sort();
        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        hex(&hasher.finalize())
    }
}

fn zone_key<'a>(node: &'a Node, rank: &BTreeMap<&str, usize>) -> (usize, &'a str) {
    match node.zone.as_deref() {
        None => (0, ""),
        Some(z) => match rank.get(z) {
            Some(i) => (i + 1, z),
            None => (usize::MAX, z),
        },
    }
}

/// Content fingerprint for dialect text that has no IR behind it.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Normalize a free-form identifier into `lower_snake_case` (ascii
/// alphanumeric + underscore).
pub fn normalize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
