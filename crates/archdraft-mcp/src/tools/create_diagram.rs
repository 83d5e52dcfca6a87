//! Create-diagram tool - commit a fresh IR from planner-structured intent
//!
//! The planner supplies nodes and edges it extracted from the user message;
//! this tool normalizes identifiers, assembles the IR, and commits version 1
//! (or a new lineage alongside an existing one). It never invents structure.

use crate::deps::ToolDeps;
use crate::registry::{CallContext, McpTool, ToolDescriptor, ToolMode, ToolOutput};
use archdraft_core::{DiagramId, Error, Result};
use archdraft_ir::{
    normalize_id, DiagramIr, DiagramType, Edge, Node, NodeType, RelType, Zone,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub struct CreateDiagramTool {
    deps: Arc<ToolDeps>,
}

impl CreateDiagramTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait::async_trait]
impl McpTool for CreateDiagramTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            tool_id: "create_diagram".to_string(),
            description: "Create a new diagram from structured nodes and edges; commits IR \
                          version 1 and makes it the session's active diagram."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["nodes"],
                "properties": {
                    "diagram_type": {
                        "type": "string",
                        "enum": ["context", "container", "component", "sequence", "flow", "story"]
                    },
                    "nodes": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "required": ["id", "label"],
                            "properties": {
                                "id": { "type": "string" },
                                "label": { "type": "string" },
                                "type": {
                                    "type": "string",
                                    "enum": ["system", "container", "component", "data_store", "external", "actor"]
                                },
                                "zone": { "type": "string" },
                                "role": { "type": "string" }
                            }
                        }
                    },
                    "edges": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["from", "to"],
                            "properties": {
                                "from": { "type": "string" },
                                "to": { "type": "string" },
                                "rel_type": {
                                    "type": "string",
                                    "enum": ["sync", "async", "data_flow", "replication",
                                             "secret_distribution", "monitoring", "auth", "control"]
                                },
                                "label": { "type": "string" }
                            }
                        }
                    },
                    "zones": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["id", "label"],
                            "properties": {
                                "id": { "type": "string" },
                                "label": { "type": "string" }
                            }
                        }
                    }
                }
            }),
            output_schema: json!({
                "type": "object",
                "required": ["diagram_id", "ir_version"],
                "properties": {
                    "diagram_id": { "type": "string" },
                    "ir_version": { "type": "integer" },
                    "node_count": { "type": "integer" },
                    "edge_count": { "type": "integer" }
                }
            }),
            mode: ToolMode::PureTransform,
        }
    }

    async fn execute(&self, args: Value, ctx: &CallContext) -> Result<ToolOutput> {
        let diagram_type: DiagramType = args["diagram_type"]
            .as_str()
            .map(|s| serde_json::from_value(json!(s)))
            .transpose()
            .map_err(|e| Error::validation(vec![format!("bad diagram_type: {}", e)]))?
            .unwrap_or(DiagramType::Component);

        let mut ir = DiagramIr::initial(DiagramId::generate(), diagram_type);

        for zone in args["zones"].as_array().into_iter().flatten() {
            ir.zones.push(Zone {
                zone_id: normalize_id(zone["id"].as_str().unwrap_or_default()),
                label: zone["label"].as_str().unwrap_or_default().to_string(),
            });
        }
        ir.zone_order = ir.zones.iter().map(|z| z.zone_id.clone()).collect();

        for raw in args["nodes"]
            .as_array()
            .ok_or_else(|| Error::validation(vec!["nodes must be an array".to_string()]))?
        {
            let node_id = normalize_id(raw["id"].as_str().unwrap_or_default());
            let node_type: NodeType = raw["type"]
                .as_str()
                .map(|s| serde_json::from_value(json!(s)))
                .transpose()
                .map_err(|e| Error::validation(vec![format!("bad node type: {}", e)]))?
                .unwrap_or(NodeType::Component);
            let mut node = Node::new(
                node_id,
                raw["label"].as_str().unwrap_or_default(),
                node_type,
            );
            node.zone = raw["zone"].as_str().map(normalize_id);
            node.role = raw["role"].as_str().map(String::from);
            ir.nodes.push(node);
        }

        for (i, raw) in args["edges"].as_array().into_iter().flatten().enumerate() {
            let rel_type: RelType = raw["rel_type"]
                .as_str()
                .map(|s| serde_json::from_value(json!(s)))
                .transpose()
                .map_err(|e| Error::validation(vec![format!("bad rel_type: {}", e)]))?
                .unwrap_or(RelType::Sync);
            let mut edge = Edge::new(
                format!("e{}", i + 1),
                normalize_id(raw["from"].as_str().unwrap_or_default()),
                normalize_id(raw["to"].as_str().unwrap_or_default()),
                rel_type,
            );
            edge.label = raw["label"].as_str().unwrap_or_default().to_string();
            if !diagram_type.is_structural() {
                edge.sequence = Some(i as u32 + 1);
            }
            ir.edges.push(edge);
        }

        let diagram_id = ir.diagram_id.clone();
        let node_count = ir.nodes.len();
        let edge_count = ir.edges.len();
        let version = self.deps.ir.put(ir)?;

        self.deps
            .stores
            .sessions
            .set_active_diagram(&ctx.session_id, diagram_id.clone());
        info!(diagram = %diagram_id, version, nodes = node_count, "diagram created");

        Ok(ToolOutput::payload(json!({
            "diagram_id": diagram_id,
            "ir_version": version,
            "node_count": node_count,
            "edge_count": edge_count,
        })))
    }
}
