//! Orchestrator
//!
//! The deterministic core of a chat turn: persist the plan before anything
//! executes, walk its steps in order through the MCP registry, collect
//! execution records, and fold the results into one response envelope. A
//! failed step skips its dependents; independent steps still run.

use crate::state::AppState;
use archdraft_agents::planner::{IrSummary, PlannerContext, ToolSummary};
use archdraft_core::{
    Block, ChatMessage, EnvelopeState, Error, ExecutionRecord, ExecutionStatus, PlanRecord,
    PlanStatus, PlanStep, ResponseEnvelope, SessionId,
};
use archdraft_mcp::{CallContext, ToolEnvelope};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Everything one plan execution produced.
pub struct PlanOutcome {
    pub records: Vec<ExecutionRecord>,
    pub blocks: Vec<Block>,
    pub state: EnvelopeState,
    pub failed_steps: HashSet<usize>,
    pub last_image_id: Option<String>,
}

/// Handle one chat message end to end. The session lock serializes turns;
/// expected failures come back as envelope content, never as an error.
pub async fn handle_chat(state: &AppState, session_id: SessionId, message: &str) -> ResponseEnvelope {
    let lock = state.session_lock(&session_id);
    let _turn = lock.lock().await;

    let correlation_id = Uuid::new_v4().to_string();
    let stores = &state.deps.stores;
    stores.sessions.get_or_create(&session_id);
    stores
        .sessions
        .append_message(&session_id, ChatMessage::user(message));

    let context = planner_context(state, &session_id);
    let tools: Vec<ToolSummary> = state
        .registry
        .catalog()
        .into_iter()
        .map(|d| ToolSummary {
            tool_id: d.tool_id,
            description: d.description,
        })
        .collect();

    let plan = match state
        .planner
        .plan(&session_id, message, &tools, &context)
        .await
    {
        Ok(plan) => plan,
        Err(e) => {
            let envelope = ResponseEnvelope::text_only(
                session_id.clone(),
                format!("{}: the request could not be planned ({})", e.kind(), e),
            );
            record_assistant(state, &session_id, &envelope);
            return envelope;
        }
    };

    // the plan record exists before the first tool runs
    stores.plans.insert(plan.clone());
    stores.plans.set_status(&plan.plan_id, PlanStatus::Executing);

    let outcome = execute_plan(state, &plan).await;

    let status = if outcome.failed_steps.is_empty() {
        PlanStatus::Executed
    } else if outcome.failed_steps.len() == plan.steps.len() {
        PlanStatus::Failed
    } else {
        PlanStatus::PartiallyExecuted
    };
    stores.plans.set_status(&plan.plan_id, status);
    info!(
        plan = %plan.plan_id,
        session = %session_id,
        correlation = %correlation_id,
        ?status,
        "plan finished"
    );

    let confidence = if plan.steps.is_empty() {
        1.0
    } else {
        (plan.steps.len() - outcome.failed_steps.len()) as f64 / plan.steps.len() as f64
    };

    let blocks = if outcome.blocks.is_empty() {
        vec![Block::text("Nothing to report for that request.")]
    } else {
        outcome.blocks
    };
    let envelope =
        ResponseEnvelope::from_blocks(session_id.clone(), blocks, outcome.state, confidence);
    record_assistant(state, &session_id, &envelope);
    envelope
}

/// Execute every step of a persisted plan in order.
pub async fn execute_plan(state: &AppState, plan: &PlanRecord) -> PlanOutcome {
    let mut outcome = PlanOutcome {
        records: Vec::new(),
        blocks: Vec::new(),
        state: EnvelopeState::default(),
        failed_steps: HashSet::new(),
        last_image_id: None,
    };

    for (index, step) in plan.steps.iter().enumerate() {
        if let Some(&blocked_on) = step
            .depends_on
            .iter()
            .find(|d| outcome.failed_steps.contains(*d))
        {
            let skip = Error::SkippedDueToUpstream(blocked_on);
            let record = ExecutionRecord {
                execution_id: Uuid::new_v4().to_string(),
                plan_id: plan.plan_id.clone(),
                step_index: index,
                tool_id: step.tool_id.clone(),
                arguments: step.arguments.clone(),
                output: json!({ "error_kind": skip.kind(), "error": skip.to_string() }),
                audit_id: None,
                duration_ms: 0,
                status: ExecutionStatus::Skipped,
            };
            state.deps.stores.plans.record_execution(record.clone());
            outcome.records.push(record);
            outcome.failed_steps.insert(index);
            continue;
        }

        let ctx = CallContext {
            plan_id: plan.plan_id.clone(),
            session_id: plan.session_id.clone(),
            rendering_service: step.rendering_service.clone(),
            llm_diagram: step.llm_diagram.clone(),
        };

        let started = Instant::now();
        let envelope = state
            .registry
            .execute(&step.tool_id, step.arguments.clone(), &ctx)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let record = ExecutionRecord {
            execution_id: Uuid::new_v4().to_string(),
            plan_id: plan.plan_id.clone(),
            step_index: index,
            tool_id: step.tool_id.clone(),
            arguments: step.arguments.clone(),
            output: serde_json::to_value(&envelope).unwrap_or(Value::Null),
            audit_id: envelope.audit_id.clone(),
            duration_ms,
            status: if envelope.success {
                ExecutionStatus::Ok
            } else {
                ExecutionStatus::Failed
            },
        };
        state.deps.stores.plans.record_execution(record.clone());
        outcome.records.push(record);

        if envelope.success {
            fold_success(&mut outcome, step, &envelope);
        } else {
            outcome.failed_steps.insert(index);
            fold_failure(&mut outcome, step, &envelope);
        }
    }

    // final state reflects the store, not the steps' own claims
    if let Some(session) = state.deps.stores.sessions.get(&plan.session_id) {
        if let Some(diagram_id) = session.active_diagram {
            if let Ok(latest) = state.deps.ir.latest(&diagram_id) {
                outcome.state.ir_version = Some(latest.version);
            }
        }
    }

    outcome
}

fn fold_success(outcome: &mut PlanOutcome, step: &PlanStep, envelope: &ToolEnvelope) {
    let payload = &envelope.payload;
    match step.tool_id.as_str() {
        "explain" => {
            if let Some(text) = payload["text"].as_str() {
                outcome.blocks.push(Block::text(text));
            }
        }
        "create_diagram" => {
            outcome.state.has_diagram = true;
            outcome.state.ir_version = payload["ir_version"].as_u64();
        }
        "render_diagram" => {
            if let Some(image_id) = payload["image_id"].as_str() {
                outcome.blocks.push(Block::diagram(
                    image_id,
                    payload["diagram_id"].as_str().unwrap_or_default(),
                    payload["ir_version"].as_u64().unwrap_or_default(),
                ));
                outcome.state.has_diagram = true;
                outcome.last_image_id = Some(image_id.to_string());
            }
        }
        "apply_patch" => {
            outcome.state.ir_version = payload["ir_version"].as_u64();
            outcome.state.has_diagram = true;
        }
        "apply_styling" => {
            if let Some(version) = payload["ir_version"].as_u64() {
                outcome.state.ir_version = Some(version);
                outcome.state.has_diagram = true;
                outcome
                    .blocks
                    .push(Block::text(format!("Updated the diagram (version {}).", version)));
            } else if let Some(explanation) = payload["explanation"].as_str() {
                outcome.blocks.push(Block::text(explanation));
            }
        }
        "analyze_architecture" => {
            let score = payload["score"].as_f64().unwrap_or_default();
            outcome
                .blocks
                .push(Block::analysis(score, payload["findings"].clone()));
            outcome.state.analysis_score = Some(score);
        }
        "ingest_repo" => {
            let text = if payload["cached"].as_bool().unwrap_or(false) {
                format!(
                    "Repository already ingested (job {}).",
                    payload["job_id"].as_str().unwrap_or_default()
                )
            } else {
                format!(
                    "Ingestion queued as job {}; poll /api/ingest/{} for progress.",
                    payload["job_id"].as_str().unwrap_or_default(),
                    payload["job_id"].as_str().unwrap_or_default()
                )
            };
            outcome.blocks.push(Block::text(text));
        }
        _ => {
            outcome.blocks.push(Block::text(
                serde_json::to_string(payload).unwrap_or_default(),
            ));
        }
    }
}

fn fold_failure(outcome: &mut PlanOutcome, step: &PlanStep, envelope: &ToolEnvelope) {
    let kind = envelope.error_kind.as_deref().unwrap_or("INTERNAL");
    let message = envelope.error.as_deref().unwrap_or("unknown failure");
    match kind {
        // renderer trouble invites a retry with a different renderer
        "RENDER_FAILED" => outcome.blocks.push(Block::action(
            "retry_render",
            json!({
                "message": message,
                "failed_tool": step.tool_id,
                "alternatives": ["mermaid", "structurizr", "plantuml"],
            }),
        )),
        _ => outcome
            .blocks
            .push(Block::text(format!("{}: {}", kind, message))),
    }
}

/// Run one tool as its own single-step plan. Used by the feedback endpoint
/// and /mcp/execute so the plan-before-execution invariant holds everywhere.
pub async fn run_tool_as_plan(
    state: &AppState,
    session_id: SessionId,
    intent: &str,
    steps: Vec<PlanStep>,
    user_message: &str,
) -> (PlanRecord, PlanOutcome) {
    let plan = PlanRecord::new(session_id, intent, steps, user_message);
    state.deps.stores.plans.insert(plan.clone());
    state
        .deps
        .stores
        .plans
        .set_status(&plan.plan_id, PlanStatus::Executing);

    let outcome = execute_plan(state, &plan).await;

    let status = if outcome.failed_steps.is_empty() {
        PlanStatus::Executed
    } else if outcome.failed_steps.len() == plan.steps.len() {
        PlanStatus::Failed
    } else {
        PlanStatus::PartiallyExecuted
    };
    state.deps.stores.plans.set_status(&plan.plan_id, status);
    (plan, outcome)
}

fn planner_context(state: &AppState, session_id: &SessionId) -> PlannerContext {
    let stores = &state.deps.stores;
    let session = stores.sessions.get(session_id);
    let latest_ir = session
        .as_ref()
        .and_then(|s| s.active_diagram.clone())
        .and_then(|id| state.deps.ir.latest(&id).ok())
        .map(|ir| IrSummary::of(&ir));
    let history = session
        .map(|s| {
            s.messages
                .iter()
                .rev()
                .take(6)
                .rev()
                .map(|m| format!("{:?}: {}", m.role, truncate(&m.content, 200)))
                .collect()
        })
        .unwrap_or_default();
    PlannerContext {
        latest_ir,
        available_renderers: vec![
            "mermaid".to_string(),
            "structurizr".to_string(),
            "plantuml".to_string(),
        ],
        history,
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}

fn record_assistant(state: &AppState, session_id: &SessionId, envelope: &ResponseEnvelope) {
    let text: String = envelope
        .blocks
        .iter()
        .filter_map(|b| b.payload["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let content = if text.is_empty() {
        serde_json::to_string(&envelope.response_type).unwrap_or_default()
    } else {
        text
    };
    state
        .deps
        .stores
        .sessions
        .append_message(session_id, ChatMessage::assistant(content));
}

/// Envelope for failures nothing recovered from: a text block with the
/// correlation id, logged at error level.
pub fn internal_failure_envelope(session_id: SessionId, correlation_id: &str, detail: &str) -> ResponseEnvelope {
    error!(correlation = correlation_id, "unexpected failure: {}", detail);
    ResponseEnvelope::text_only(
        session_id,
        format!(
            "Something went wrong on our side. Reference {} when reporting this.",
            correlation_id
        ),
    )
}
