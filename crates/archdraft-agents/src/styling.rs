//! Styling Agent - constrained LLM-driven IR mutation
//!
//! Pure transformation: current IR plus an edit suggestion in, either
//! patch ops, a full replacement IR, or a structured refusal out. The agent
//! cannot reach MCP tools, renderers, or stores; the orchestrator applies
//! whatever comes back through the patch engine after validation. Every
//! invocation yields the material for a styling audit.

use crate::schemas;
use archdraft_core::{Error, LlmConfig, Result};
use archdraft_ir::{DiagramIr, PatchOp};
use archdraft_llm::{complete_with_schema, LlmClient, LlmError, LlmRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

const STYLING_SYSTEM: &str = "You edit architecture diagrams through a closed set of \
patch operations. Respond with a single JSON object matching the given schema. \
Prefer patch_ops; return updated_ir only for sweeping restructures; return mode \
\"error\" with an explanation when the request cannot be honored.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StylingMode {
    StyleOnly,
    StructuralEdit,
}

impl StylingMode {
    fn as_str(&self) -> &'static str {
        match self {
            StylingMode::StyleOnly => "style_only",
            StylingMode::StructuralEdit => "structural_edit",
        }
    }
}

#[derive(Clone, Debug)]
pub enum StylingOutcome {
    PatchOps(Vec<PatchOp>),
    UpdatedIr(DiagramIr),
    Error { explanation: String },
}

/// What one agent invocation produced: the outcome plus everything the
/// audit record needs.
#[derive(Clone, Debug)]
pub struct StylingRun {
    pub outcome: StylingOutcome,
    pub extracted_intent: String,
    pub agent_reasoning: String,
    pub styling_plan: Value,
    pub raw_response: String,
    pub validation_warnings: Vec<String>,
}

pub struct StylingAgent {
    client: Arc<dyn LlmClient>,
    config: LlmConfig,
}

impl StylingAgent {
    pub fn new(client: Arc<dyn LlmClient>, config: LlmConfig) -> Self {
        Self { client, config }
    }

    pub async fn run(
        &self,
        current_ir: &DiagramIr,
        suggestion: Option<&str>,
        mode: StylingMode,
        constraints: Option<&Value>,
    ) -> Result<StylingRun> {
        let prompt = self.build_prompt(current_ir, suggestion, mode, constraints);
        let request = LlmRequest::new(&self.config.model, prompt).with_system(STYLING_SYSTEM);

        let value = match complete_with_schema(
            self.client.as_ref(),
            request,
            &schemas::styling_schema(),
            self.config.timeout_ms,
        )
        .await
        {
            Ok(value) => value,
            Err(LlmError::Timeout(ms)) => return Err(Error::LlmTimeout(ms)),
            Err(LlmError::SchemaViolation { errors }) => {
                // deviation is replaced with a deterministic refusal
                warn!("styling output violated schema: {}", errors.join("; "));
                return Ok(StylingRun {
                    outcome: StylingOutcome::Error {
                        explanation: "the styling model returned an unusable response".to_string(),
                    },
                    extracted_intent: suggestion.unwrap_or_default().to_string(),
                    agent_reasoning: String::new(),
                    styling_plan: Value::Null,
                    raw_response: String::new(),
                    validation_warnings: errors,
                });
            }
            Err(e) => return Err(Error::UpstreamFailed(e.to_string())),
        };

        let raw_response = value.to_string();
        let extracted_intent = value["intent"].as_str().unwrap_or_default().to_string();
        let agent_reasoning = value["reasoning"].as_str().unwrap_or_default().to_string();
        let mut validation_warnings = Vec::new();

        let outcome = match value["mode"].as_str() {
            Some("patch_ops") => {
                match serde_json::from_value::<Vec<PatchOp>>(value["patch_ops"].clone()) {
                    Ok(ops) if !ops.is_empty() => {
                        if mode == StylingMode::StyleOnly
                            && ops.iter().any(is_structural_op)
                        {
                            StylingOutcome::Error {
                                explanation:
                                    "structural edits are not allowed in style_only mode"
                                        .to_string(),
                            }
                        } else {
                            StylingOutcome::PatchOps(ops)
                        }
                    }
                    Ok(_) => StylingOutcome::Error {
                        explanation: "the styling model proposed no operations".to_string(),
                    },
                    Err(e) => {
                        validation_warnings.push(format!("patch ops do not parse: {}", e));
                        StylingOutcome::Error {
                            explanation: "the styling model proposed unknown operations"
                                .to_string(),
                        }
                    }
                }
            }
            Some("updated_ir") => match merge_updated_ir(current_ir, &value["ir"]) {
                Ok(ir) => StylingOutcome::UpdatedIr(ir),
                Err(e) => {
                    validation_warnings.push(e.to_string());
                    StylingOutcome::Error {
                        explanation: "the replacement diagram did not validate".to_string(),
                    }
                }
            },
            _ => StylingOutcome::Error {
                explanation: value["explanation"]
                    .as_str()
                    .unwrap_or("the request could not be interpreted")
                    .to_string(),
            },
        };

        Ok(StylingRun {
            outcome,
            extracted_intent,
            agent_reasoning,
            styling_plan: json!({
                "mode": value["mode"],
                "ops": value["patch_ops"],
            }),
            raw_response,
            validation_warnings,
        })
    }

    fn build_prompt(
        &self,
        ir: &DiagramIr,
        suggestion: Option<&str>,
        mode: StylingMode,
        constraints: Option<&Value>,
    ) -> String {
        let ir_json = serde_json::to_string_pretty(ir).unwrap_or_default();
        let mut prompt = format!(
            "## Mode\n{}\n\n## Current diagram IR\n{}\n",
            mode.as_str(),
            ir_json
        );
        if let Some(s) = suggestion {
            prompt.push_str(&format!("\n## Requested edit\n{}\n", s));
        }
        if let Some(c) = constraints {
            prompt.push_str(&format!("\n## Constraints\n{}\n", c));
        }
        prompt.push_str(
            "\nAvailable ops: edit_text, reposition, style, hide, show, annotate, \
             add_block, remove_block, update_node_label, update_edge_label, \
             delete_node, delete_edge, move_zone, update_global_intent, \
             convert_diagram_type. Styling writes only to the intent maps; never \
             emit colors, coordinates, or renderer syntax.",
        );
        prompt
    }
}

fn is_structural_op(op: &PatchOp) -> bool {
    matches!(
        op,
        PatchOp::AddBlock { .. }
            | PatchOp::RemoveBlock { .. }
            | PatchOp::DeleteNode { .. }
            | PatchOp::DeleteEdge { .. }
            | PatchOp::ConvertDiagramType { .. }
    )
}

/// Merge a full replacement IR from the agent over its parent. Any section
/// the replacement omits is taken from the parent; identity and version
/// fields always come from the parent lineage. The result is validated.
pub fn merge_updated_ir(parent: &DiagramIr, updated: &Value) -> Result<DiagramIr> {
    if !updated.is_object() {
        return Err(Error::validation(vec![
            "replacement ir is not an object".to_string()
        ]));
    }

    let mut base = serde_json::to_value(parent)
        .map_err(|e| Error::internal(format!("ir serialization failed: {}", e)))?;
    let obj = base
        .as_object_mut()
        .ok_or_else(|| Error::internal("ir is not an object"))?;

    for section in [
        "diagram_type",
        "nodes",
        "edges",
        "zones",
        "zone_order",
        "global_intent",
        "node_intent",
        "edge_intent",
    ] {
        if let Some(value) = updated.get(section) {
            if !value.is_null() {
                obj.insert(section.to_string(), value.clone());
            }
        }
    }

    let mut merged: DiagramIr = serde_json::from_value(base)
        .map_err(|e| Error::validation(vec![format!("replacement ir does not parse: {}", e)]))?;
    merged.diagram_id = parent.diagram_id.clone();
    merged.parent_version = Some(parent.version);
    merged.version = parent.version + 1;
    merged.metadata = parent.metadata.clone();
    merged.metadata.created_at = chrono::Utc::now();

    archdraft_ir::validate_strict(&merged)?;
    Ok(merged)
}
