//! Explain tool - turn planner-provided prose into a text block

use crate::registry::{CallContext, McpTool, ToolDescriptor, ToolMode, ToolOutput};
use archdraft_core::Result;
use serde_json::{json, Value};

pub struct ExplainTool;

impl ExplainTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExplainTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl McpTool for ExplainTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            tool_id: "explain".to_string(),
            description: "Answer the user in prose; also the deterministic fallback step."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["text"],
                "properties": {
                    "text": { "type": "string", "minLength": 1 }
                }
            }),
            output_schema: json!({
                "type": "object",
                "required": ["text"],
                "properties": {
                    "text": { "type": "string" }
                }
            }),
            mode: ToolMode::PureTransform,
        }
    }

    async fn execute(&self, args: Value, _ctx: &CallContext) -> Result<ToolOutput> {
        let text = args["text"].as_str().unwrap_or_default();
        Ok(ToolOutput::payload(json!({ "text": text })))
    }
}
