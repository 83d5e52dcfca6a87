//! Planner - the single LLM-backed decision point
//!
//! One pass per user message. The output is schema-validated before anything
//! trusts it; the planner alone decides renderer selection and whether an
//! LLM-authored diagram is used. On LLM timeout it degrades to a
//! deterministic single-step explain plan.

use crate::schemas;
use archdraft_core::{
    Error, LlmConfig, PlanRecord, PlanStep, Result, SessionId,
};
use archdraft_ir::DiagramIr;
use archdraft_llm::{complete_with_schema, LlmClient, LlmError, LlmRequest};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const PLANNER_SYSTEM: &str = "You are the planner of a diagram authoring runtime. \
Respond with a single JSON object matching the given schema: an intent string \
and an ordered list of tool steps. Never include prose outside the JSON.";

/// Catalog entry handed to the planner prompt. The planner sees tool ids and
/// descriptions, never the tools themselves.
#[derive(Clone, Debug)]
pub struct ToolSummary {
    pub tool_id: String,
    pub description: String,
}

/// Everything the planner may look at for one pass.
#[derive(Clone, Debug, Default)]
pub struct PlannerContext {
    pub latest_ir: Option<IrSummary>,
    pub available_renderers: Vec<String>,
    pub history: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct IrSummary {
    pub diagram_id: String,
    pub version: u64,
    pub diagram_type: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub node_ids: Vec<String>,
}

impl IrSummary {
    pub fn of(ir: &DiagramIr) -> Self {
        Self {
            diagram_id: ir.diagram_id.to_string(),
            version: ir.version,
            diagram_type: ir.diagram_type.as_str().to_string(),
            node_count: ir.nodes.len(),
            edge_count: ir.edges.len(),
            node_ids: ir.nodes.iter().map(|n| n.node_id.clone()).collect(),
        }
    }
}

pub struct Planner {
    client: Arc<dyn LlmClient>,
    config: LlmConfig,
}

impl Planner {
    pub fn new(client: Arc<dyn LlmClient>, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// Produce a plan for one user message. Timeout degrades to the
    /// deterministic fallback; a schema violation is PLAN_INVALID.
    pub async fn plan(
        &self,
        session_id: &SessionId,
        user_message: &str,
        tools: &[ToolSummary],
        context: &PlannerContext,
    ) -> Result<PlanRecord> {
        let prompt = self.build_prompt(user_message, tools, context);
        let request =
            LlmRequest::new(&self.config.model, prompt).with_system(PLANNER_SYSTEM);

        let value = match complete_with_schema(
            self.client.as_ref(),
            request,
            &schemas::plan_schema(),
            self.config.timeout_ms,
        )
        .await
        {
            Ok(value) => value,
            Err(LlmError::Timeout(ms)) => {
                warn!(session = %session_id, "planner timed out after {}ms, using fallback", ms);
                return Ok(self.fallback_plan(session_id, user_message));
            }
            Err(LlmError::SchemaViolation { errors }) => {
                return Err(Error::PlanInvalid(errors.join("; ")));
            }
            Err(e) => return Err(Error::PlanInvalid(e.to_string())),
        };

        let intent = value["intent"].as_str().unwrap_or("unknown").to_string();
        let steps: Vec<PlanStep> = serde_json::from_value(value["steps"].clone())
            .map_err(|e| Error::PlanInvalid(format!("steps do not parse: {}", e)))?;

        if steps.is_empty() {
            return Err(Error::PlanInvalid("plan has no steps".to_string()));
        }
        for (i, step) in steps.iter().enumerate() {
            for dep in &step.depends_on {
                if *dep >= i {
                    return Err(Error::PlanInvalid(format!(
                        "step {} depends on step {} which is not earlier",
                        i, dep
                    )));
                }
            }
        }

        info!(session = %session_id, intent = %intent, steps = steps.len(), "plan produced");
        Ok(PlanRecord::new(
            session_id.clone(),
            intent,
            steps,
            user_message,
        ))
    }

    /// The deterministic fallback: one explain step that produces a
    /// clarification text block.
    pub fn fallback_plan(&self, session_id: &SessionId, user_message: &str) -> PlanRecord {
        let step = PlanStep {
            tool_id: "explain".to_string(),
            arguments: json!({
                "text": "I could not plan that request in time. Could you rephrase \
                         or narrow down what you want the diagram to show?"
            }),
            rendering_service: None,
            llm_diagram: None,
            depends_on: Vec::new(),
        };
        PlanRecord::new(
            session_id.clone(),
            "clarify",
            vec![step],
            user_message,
        )
    }

    fn build_prompt(
        &self,
        user_message: &str,
        tools: &[ToolSummary],
        context: &PlannerContext,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str("## Tools\n");
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.tool_id, tool.description));
        }
        prompt.push_str("\n## Renderers\n");
        if context.available_renderers.is_empty() {
            prompt.push_str("mermaid, structurizr, plantuml\n");
        } else {
            prompt.push_str(&context.available_renderers.join(", "));
            prompt.push('\n');
        }
        if let Some(ir) = &context.latest_ir {
            prompt.push_str(&format!(
                "\n## Current diagram\nid={} version={} type={} nodes={} edges={}\nnode ids: {}\n",
                ir.diagram_id,
                ir.version,
                ir.diagram_type,
                ir.node_count,
                ir.edge_count,
                ir.node_ids.join(", ")
            ));
        } else {
            prompt.push_str("\n## Current diagram\nnone\n");
        }
        if !context.history.is_empty() {
            prompt.push_str("\n## Recent conversation\n");
            for line in context.history.iter().rev().take(6).rev() {
                prompt.push_str(line);
                prompt.push('\n');
            }
        }
        prompt.push_str(&format!("\n## User message\n{}\n", user_message));
        prompt.push_str(
            "\nReturn the JSON plan. Use depends_on to mark steps that need an \
             earlier step's output.",
        );
        prompt
    }
}
