//! Apply-styling tool - run the Styling Agent and land its output
//!
//! The agent itself only proposes; this tool applies patch ops through the
//! patch engine (or merges a validated full IR), commits the child version
//! together with its styling audit in one transaction, and reports the patch
//! summary. The audit carries the renderer-facing projection of the diagram
//! before and after the edit.

use crate::deps::ToolDeps;
use crate::registry::{CallContext, McpTool, ToolDescriptor, ToolMode, ToolOutput};
use crate::tools::resolve_diagram_id;
use archdraft_agents::{StylingMode, StylingOutcome, StylingRun};
use archdraft_core::{
    AuditArtifacts, AuditMode, DiagramId, Error, Result, StylingAudit,
};
use archdraft_ir::{apply_patch, DiagramIr, PatchSummary};
use archdraft_render::{route, translate};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub struct ApplyStylingTool {
    deps: Arc<ToolDeps>,
}

impl ApplyStylingTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self { deps }
    }

    /// Dialect projection used for audit before/after text. The routed
    /// renderer for the diagram's own type always supports it.
    fn projection(&self, ir: &DiagramIr) -> String {
        route(ir.diagram_type, None)
            .and_then(|decision| translate(ir, decision.renderer))
            .unwrap_or_default()
    }

    fn build_audit(
        &self,
        ctx: &CallContext,
        diagram_id: &DiagramId,
        run: &StylingRun,
        user_prompt: &str,
        before: String,
        after: String,
        execution_steps: Vec<String>,
    ) -> StylingAudit {
        StylingAudit {
            audit_id: uuid::Uuid::new_v4().to_string(),
            plan_id: Some(ctx.plan_id.clone()),
            diagram_id: diagram_id.clone(),
            mode: AuditMode::PreRender,
            user_prompt: user_prompt.to_string(),
            extracted_intent: run.extracted_intent.clone(),
            styling_plan: run.styling_plan.clone(),
            execution_steps,
            agent_reasoning: run.agent_reasoning.clone(),
            llm_diagram: Some(run.raw_response.clone()),
            sanitized_diagram: None,
            validation_warnings: run.validation_warnings.clone(),
            blocked_tokens: Vec::new(),
            artifacts: AuditArtifacts::PreRender {
                renderer_input_before: before,
                renderer_input_after: after,
            },
            created_at: Utc::now(),
        }
    }
}

#[async_trait::async_trait]
impl McpTool for ApplyStylingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            tool_id: "apply_styling".to_string(),
            description: "Interpret a styling or edit request with the styling agent and \
                          commit the resulting IR version; every run is audited."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["suggestion"],
                "properties": {
                    "diagram_id": { "type": "string" },
                    "suggestion": { "type": "string", "minLength": 1 },
                    "mode": {
                        "type": "string",
                        "enum": ["style_only", "structural_edit"]
                    },
                    "constraints": { "type": "object" }
                }
            }),
            output_schema: json!({
                "type": "object",
                "required": ["diagram_id"],
                "properties": {
                    "diagram_id": { "type": "string" },
                    "ir_version": { "type": "integer" },
                    "summary": { "type": "object" },
                    "explanation": { "type": "string" }
                }
            }),
            mode: ToolMode::PureTransform,
        }
    }

    async fn execute(&self, args: Value, ctx: &CallContext) -> Result<ToolOutput> {
        let diagram_id = resolve_diagram_id(&self.deps, &args, ctx)
            .ok_or_else(|| Error::not_found("no diagram for this session"))?;
        let parent = self.deps.ir.latest(&diagram_id)?;

        let suggestion = args["suggestion"].as_str().unwrap_or_default();
        let mode = match args["mode"].as_str() {
            Some("structural_edit") => StylingMode::StructuralEdit,
            _ => StylingMode::StyleOnly,
        };
        let constraints = args.get("constraints").filter(|c| !c.is_null());

        let run = self
            .deps
            .styling
            .run(&parent, Some(suggestion), mode, constraints)
            .await?;

        let before = self.projection(&parent);

        let (child, summary): (DiagramIr, PatchSummary) = match &run.outcome {
            StylingOutcome::PatchOps(ops) => apply_patch(&parent, ops)?,
            StylingOutcome::UpdatedIr(ir) => {
                let mut summary = PatchSummary::default();
                summary.operations.push("updated_ir".to_string());
                (ir.clone(), summary)
            }
            StylingOutcome::Error { explanation } => {
                // no mutation: audit the refusal with an unchanged projection
                let audit = self.build_audit(
                    ctx,
                    &diagram_id,
                    &run,
                    suggestion,
                    before.clone(),
                    before,
                    vec!["agent_refused".to_string()],
                );
                let audit_id = self.deps.stores.audits.append(audit);
                return Ok(ToolOutput::payload(json!({
                    "diagram_id": diagram_id,
                    "explanation": explanation,
                }))
                .with_audit(audit_id)
                .with_warnings(run.validation_warnings.clone()));
            }
        };

        let after = self.projection(&child);
        let audit = self.build_audit(
            ctx,
            &diagram_id,
            &run,
            suggestion,
            before,
            after,
            summary.operations.clone(),
        );

        // IR version and its audit commit atomically
        let mut audit_id = None;
        let audits = self.deps.stores.audits.clone();
        let version = self.deps.ir.put_txn(child, |_| {
            audit_id = Some(audits.append(audit));
            Ok(())
        })?;
        info!(diagram = %diagram_id, version, "styling committed");

        let output = ToolOutput::payload(json!({
            "diagram_id": diagram_id,
            "ir_version": version,
            "summary": summary,
        }))
        .with_warnings(run.validation_warnings.clone());
        Ok(match audit_id {
            Some(id) => output.with_audit(id),
            None => output,
        })
    }
}
