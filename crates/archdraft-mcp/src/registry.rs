//! Tool registry and dispatch
//!
//! `execute(tool_id, args, ctx)` is the single entry point for every tool
//! invocation in the runtime. It validates arguments against the tool's
//! input schema, validates the output against the output schema, normalizes
//! the result envelope, and rejects re-entry within the same plan trace.

use archdraft_core::{Error, LlmDiagram, Result, SessionId};
use dashmap::DashMap;
use jsonschema::JSONSchema;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    PureTransform,
    Render,
    Ingest,
    Analyze,
}

#[derive(Clone, Debug, Serialize)]
pub struct ToolDescriptor {
    pub tool_id: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
    pub mode: ToolMode,
}

/// What a tool returns. Expected failures that still produced an audit (a
/// rejected unsafe diagram, for instance) come back as an output carrying
/// both the error and the audit id.
#[derive(Clone, Debug, Default)]
pub struct ToolOutput {
    pub payload: Value,
    pub audit_id: Option<String>,
    pub warnings: Vec<String>,
    pub error: Option<Error>,
}

impl ToolOutput {
    pub fn payload(payload: Value) -> Self {
        Self {
            payload,
            audit_id: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            payload: Value::Null,
            audit_id: None,
            warnings: Vec::new(),
            error: Some(error),
        }
    }

    pub fn with_audit(mut self, audit_id: impl Into<String>) -> Self {
        self.audit_id = Some(audit_id.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Normalized result envelope. Expected failures are data, not panics: the
/// orchestrator records the envelope either way.
#[derive(Clone, Debug, Serialize)]
pub struct ToolEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<String>,
    pub payload: Value,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolEnvelope {
    pub fn from_output(output: ToolOutput) -> Self {
        match output.error {
            Some(error) => Self {
                success: false,
                audit_id: output.audit_id,
                payload: output.payload,
                warnings: output.warnings,
                error_kind: Some(error.kind().to_string()),
                error: Some(error.to_string()),
            },
            None => Self {
                success: true,
                audit_id: output.audit_id,
                payload: output.payload,
                warnings: output.warnings,
                error_kind: None,
                error: None,
            },
        }
    }

    pub fn err(error: &Error) -> Self {
        Self {
            success: false,
            audit_id: None,
            payload: Value::Null,
            warnings: Vec::new(),
            error_kind: Some(error.kind().to_string()),
            error: Some(error.to_string()),
        }
    }

    pub fn err_with_audit(error: &Error, audit_id: Option<String>) -> Self {
        Self {
            audit_id,
            ..Self::err(error)
        }
    }
}

/// Per-call context threaded from the orchestrator. Tools may not reach
/// back into the orchestrator or planner; this is all they see of the plan.
#[derive(Clone, Debug)]
pub struct CallContext {
    pub plan_id: String,
    pub session_id: SessionId,
    pub rendering_service: Option<String>,
    pub llm_diagram: Option<LlmDiagram>,
}

impl CallContext {
    pub fn new(plan_id: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            plan_id: plan_id.into(),
            session_id,
            rendering_service: None,
            llm_diagram: None,
        }
    }
}

#[async_trait::async_trait]
pub trait McpTool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    async fn execute(&self, args: Value, ctx: &CallContext) -> Result<ToolOutput>;
}

pub struct McpRegistry {
    tools: HashMap<String, Arc<dyn McpTool>>,
    /// Plans currently inside execute(); re-entry with the same plan_id is
    /// recursion and is refused.
    active_plans: DashMap<String, String>,
}

impl Default for McpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl McpRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            active_plans: DashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same id.
    pub fn register(&mut self, tool: impl McpTool + 'static) {
        let id = tool.descriptor().tool_id;
        self.tools.insert(id, Arc::new(tool));
    }

    pub fn get(&self, tool_id: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.get(tool_id).cloned()
    }

    /// Descriptors for every registered tool, stable order.
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        descriptors
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tools.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The single execution entry point.
    pub async fn execute(&self, tool_id: &str, args: Value, ctx: &CallContext) -> ToolEnvelope {
        let Some(tool) = self.tools.get(tool_id) else {
            return ToolEnvelope::err(&Error::not_found(format!("tool {}", tool_id)));
        };
        let descriptor = tool.descriptor();

        // recursion prevention: one frame per plan trace
        let guard = match self.active_plans.entry(ctx.plan_id.clone()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(tool_id.to_string());
                PlanGuard {
                    plans: &self.active_plans,
                    plan_id: ctx.plan_id.clone(),
                }
            }
            dashmap::mapref::entry::Entry::Occupied(active) => {
                let err = Error::internal(format!(
                    "tool re-entry rejected: plan {} is already executing {}",
                    ctx.plan_id,
                    active.get()
                ));
                return ToolEnvelope::err(&err);
            }
        };

        if let Err(reasons) = validate_schema(&descriptor.input_schema, &args) {
            drop(guard);
            return ToolEnvelope::err(&Error::validation(reasons));
        }

        debug!(tool = tool_id, plan = %ctx.plan_id, "tool executing");
        let result = tool.execute(args, ctx).await;
        drop(guard);

        match result {
            Ok(output) => {
                if output.error.is_none() {
                    if let Err(reasons) =
                        validate_schema(&descriptor.output_schema, &output.payload)
                    {
                        warn!(tool = tool_id, "tool output violated its schema: {:?}", reasons);
                        return ToolEnvelope::err_with_audit(
                            &Error::internal(format!(
                                "tool {} output violated its schema: {}",
                                tool_id,
                                reasons.join("; ")
                            )),
                            output.audit_id,
                        );
                    }
                }
                ToolEnvelope::from_output(output)
            }
            Err(error) => {
                if error.is_expected() {
                    debug!(tool = tool_id, kind = error.kind(), "tool returned structured error");
                } else {
                    warn!(tool = tool_id, "tool failed: {}", error);
                }
                ToolEnvelope::err(&error)
            }
        }
    }
}

struct PlanGuard<'a> {
    plans: &'a DashMap<String, String>,
    plan_id: String,
}

impl Drop for PlanGuard<'_> {
    fn drop(&mut self) {
        self.plans.remove(&self.plan_id);
    }
}

fn validate_schema(schema: &Value, value: &Value) -> std::result::Result<(), Vec<String>> {
    // an empty schema object means "anything goes"
    if schema.as_object().map(|o| o.is_empty()).unwrap_or(false) {
        return Ok(());
    }
    let compiled = match JSONSchema::compile(schema) {
        Ok(compiled) => compiled,
        Err(e) => return Err(vec![format!("schema does not compile: {}", e)]),
    };
    if let Err(errors) = compiled.validate(value) {
        return Err(errors.map(|e| e.to_string()).collect());
    }
    Ok(())
}
