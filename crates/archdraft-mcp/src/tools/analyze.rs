//! Analyze tool - deterministic scoring of a committed IR

use crate::deps::ToolDeps;
use crate::registry::{CallContext, McpTool, ToolDescriptor, ToolMode, ToolOutput};
use crate::tools::resolve_diagram_id;
use archdraft_core::{Error, Result};
use archdraft_ir::DiagramIr;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub struct AnalyzeTool {
    deps: Arc<ToolDeps>,
}

impl AnalyzeTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

/// Score in [0,1]: connectivity, orphan ratio, zone coverage. Deterministic
/// on the IR alone.
pub fn score_ir(ir: &DiagramIr) -> (f64, Value) {
    let node_count = ir.nodes.len();
    if node_count == 0 {
        return (0.0, json!({ "orphans": [], "note": "empty diagram" }));
    }

    let mut connected: HashSet<&str> = HashSet::new();
    for edge in &ir.edges {
        connected.insert(edge.from_id.as_str());
        connected.insert(edge.to_id.as_str());
    }
    let orphans: Vec<&str> = ir
        .nodes
        .iter()
        .filter(|n| !connected.contains(n.node_id.as_str()))
        .map(|n| n.node_id.as_str())
        .collect();
    let orphan_ratio = orphans.len() as f64 / node_count as f64;

    let zoned = ir.nodes.iter().filter(|n| n.zone.is_some()).count();
    let zone_coverage = if ir.zones.is_empty() {
        1.0
    } else {
        zoned as f64 / node_count as f64
    };

    // edges relative to a spanning tree of the visible nodes
    let connectivity = if node_count > 1 {
        (ir.edges.len() as f64 / (node_count as f64 - 1.0)).min(1.0)
    } else {
        1.0
    };

    let score = (0.5 * connectivity + 0.3 * (1.0 - orphan_ratio) + 0.2 * zone_coverage)
        .clamp(0.0, 1.0);
    let findings = json!({
        "orphans": orphans,
        "connectivity": connectivity,
        "orphan_ratio": orphan_ratio,
        "zone_coverage": zone_coverage,
        "node_count": node_count,
        "edge_count": ir.edges.len(),
    });
    (score, findings)
}

#[async_trait::async_trait]
impl McpTool for AnalyzeTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            tool_id: "analyze_architecture".to_string(),
            description: "Score a committed diagram: connectivity, orphans, zone coverage."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "diagram_id": { "type": "string" },
                    "version": { "type": "integer", "minimum": 1 }
                }
            }),
            output_schema: json!({
                "type": "object",
                "required": ["score", "findings"],
                "properties": {
                    "score": { "type": "number" },
                    "findings": { "type": "object" },
                    "diagram_id": { "type": "string" },
                    "ir_version": { "type": "integer" }
                }
            }),
            mode: ToolMode::Analyze,
        }
    }

    async fn execute(&self, args: Value, ctx: &CallContext) -> Result<ToolOutput> {
        let diagram_id = resolve_diagram_id(&self.deps, &args, ctx)
            .ok_or_else(|| Error::not_found("no diagram for this session"))?;
        let ir = match args["version"].as_u64() {
            Some(version) => self.deps.ir.get(&diagram_id, version)?,
            None => self.deps.ir.latest(&diagram_id)?,
        };
        let (score, findings) = score_ir(&ir);
        Ok(ToolOutput::payload(json!({
            "score": score,
            "findings": findings,
            "diagram_id": diagram_id,
            "ir_version": ir.version,
        })))
    }
}
