//! Apply-patch tool - deterministic IR mutation through the patch engine

use crate::deps::ToolDeps;
use crate::registry::{CallContext, McpTool, ToolDescriptor, ToolMode, ToolOutput};
use crate::tools::resolve_diagram_id;
use archdraft_core::{Error, Result};
use archdraft_ir::{apply_patch, PatchOp};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub struct ApplyPatchTool {
    deps: Arc<ToolDeps>,
}

impl ApplyPatchTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }
}

#[async_trait::async_trait]
impl McpTool for ApplyPatchTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            tool_id: "apply_patch".to_string(),
            description: "Apply an ordered list of allow-listed patch operations to a \
                          diagram, committing a new IR version."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["ops"],
                "properties": {
                    "diagram_id": { "type": "string" },
                    "parent_version": { "type": "integer", "minimum": 1 },
                    "ops": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "required": ["op"],
                            "properties": { "op": { "type": "string" } }
                        }
                    }
                }
            }),
            output_schema: json!({
                "type": "object",
                "required": ["diagram_id", "ir_version", "summary"],
                "properties": {
                    "diagram_id": { "type": "string" },
                    "ir_version": { "type": "integer" },
                    "summary": { "type": "object" }
                }
            }),
            mode: ToolMode::PureTransform,
        }
    }

    async fn execute(&self, args: Value, ctx: &CallContext) -> Result<ToolOutput> {
        let diagram_id = resolve_diagram_id(&self.deps, &args, ctx)
            .ok_or_else(|| Error::not_found("no diagram for this session"))?;

        let ops: Vec<PatchOp> = serde_json::from_value(args["ops"].clone())
            .map_err(|e| Error::validation(vec![format!("ops do not parse: {}", e)]))?;

        // parent defaults to the latest committed version; an explicit
        // parent_version lets racing editors surface STALE_PARENT
        let parent = match args["parent_version"].as_u64() {
            Some(version) => self.deps.ir.get(&diagram_id, version)?,
            None => self.deps.ir.latest(&diagram_id)?,
        };

        let (child, summary) = apply_patch(&parent, &ops)?;
        let version = self.deps.ir.put(child)?;
        info!(diagram = %diagram_id, version, ops = ops.len(), "patch committed");

        Ok(ToolOutput::payload(json!({
            "diagram_id": diagram_id,
            "ir_version": version,
            "summary": summary,
        })))
    }
}
