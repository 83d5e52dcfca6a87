//! HTTP surface
//!
//! The chat endpoint is the sole orchestration entry; everything else reads
//! the stores or drives ingestion. Expected failures never become HTTP
//! errors on /api/chat - the client always gets a valid envelope.

use crate::orchestrator::{self, handle_chat, run_tool_as_plan};
use crate::state::AppState;
use archdraft_core::{PlanStep, RuntimeConfig, SessionId};
use archdraft_llm::LlmClient;
use axum::{
    extract::{Multipart, Path as AxumPath, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/{id}", get(get_session_handler))
        .route("/api/sessions/{id}/ingest", post(session_ingest_handler))
        .route("/api/ingest", post(ingest_handler))
        .route("/api/ingest/{job_id}", get(ingest_status_handler))
        .route("/api/diagram/render", get(render_artifact_handler))
        .route("/api/feedback", post(feedback_handler))
        .route("/api/ir/{image_id}/history", get(history_handler))
        .route(
            "/api/diagrams/{id}/styling/audit",
            get(audit_list_handler),
        )
        .route(
            "/api/diagrams/{id}/styling/audit/{audit_id}",
            get(audit_get_handler),
        )
        .route("/api/plans/{id}", get(plan_handler))
        .route("/mcp/discover", post(mcp_discover_handler))
        .route("/mcp/execute", post(mcp_execute_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

pub async fn start_gateway(config: RuntimeConfig, client: Arc<dyn LlmClient>) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = format!("{}:{}", config.bind.to_addr(), config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {}", e))?;

    let state = AppState::build(config, client);
    let app = build_router(state);

    info!("Archdraft gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Chat:         POST http://{}/api/chat", bind_addr);
    info!("  Ingestion:    POST http://{}/api/ingest", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// chat
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    session_id: Option<String>,
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    let session_id = body
        .session_id
        .map(SessionId::new)
        .unwrap_or_else(SessionId::generate);

    let correlation_id = Uuid::new_v4().to_string();
    let result = std::panic::AssertUnwindSafe(handle_chat(&state, session_id.clone(), &body.message));
    let envelope = match futures_catch(result).await {
        Ok(envelope) => envelope,
        Err(detail) => {
            orchestrator::internal_failure_envelope(session_id, &correlation_id, &detail)
        }
    };
    Json(envelope)
}

/// Catch panics from a turn so the chat surface still gets an envelope.
async fn futures_catch<F, T>(future: std::panic::AssertUnwindSafe<F>) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    use futures::FutureExt;
    match future.catch_unwind().await {
        Ok(value) => Ok(value),
        Err(panic) => Err(panic_message(panic)),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

// ---------------------------------------------------------------------------
// sessions
// ---------------------------------------------------------------------------

async fn create_session_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.deps.stores.sessions.create();
    Json(json!({ "session_id": session.session_id }))
}

async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> impl IntoResponse {
    let session_id = SessionId::new(id.as_str());
    let Some(session) = state.deps.stores.sessions.get(&session_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("session {} not found", id) })),
        )
            .into_response();
    };

    let diagrams: Vec<Value> = session
        .active_diagram
        .as_ref()
        .and_then(|d| state.deps.ir.history(d).ok())
        .map(|history| {
            history
                .iter()
                .map(|ir| {
                    json!({
                        "diagram_id": ir.diagram_id,
                        "version": ir.version,
                        "parent_version": ir.parent_version,
                        "diagram_type": ir.diagram_type,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Json(json!({
        "session_id": session.session_id,
        "created_at": session.created_at,
        "messages": session.messages,
        "active_diagram": session.active_diagram,
        "diagrams": diagrams,
    }))
    .into_response()
}

async fn session_ingest_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let session_id = SessionId::new(id.as_str());
    state.deps.stores.sessions.get_or_create(&session_id);

    let mut text: Option<String> = None;
    let mut github_url: Option<String> = None;
    let mut file_names: Vec<String> = Vec::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => text = field.text().await.ok(),
            "github_url" => github_url = field.text().await.ok().filter(|u| !u.is_empty()),
            "files" => {
                let file_name = field.file_name().map(String::from);
                if let Some(file_name) = file_name {
                    file_names.push(file_name);
                }
                // file bytes are acknowledged, not parsed; repository
                // ingestion is the structured path
                let _ = field.bytes().await;
            }
            _ => {}
        }
    }

    if let Some(text) = text.filter(|t| !t.is_empty()) {
        let note = if file_names.is_empty() {
            text
        } else {
            format!("{}\n[attached: {}]", text, file_names.join(", "))
        };
        state
            .deps
            .stores
            .sessions
            .append_message(&session_id, archdraft_core::ChatMessage::user(note));
    }

    let mut response = json!({ "session_id": session_id, "files": file_names });
    if let Some(url) = github_url {
        match state.deps.ingest.submit(&url, None).await {
            Ok(job) => {
                if let Some(obj) = response.as_object_mut() {
                    obj.insert("job_id".to_string(), json!(job.job_id));
                    obj.insert("status".to_string(), json!(job.status));
                }
            }
            Err(e) => {
                if let Some(obj) = response.as_object_mut() {
                    obj.insert("error".to_string(), json!(e.to_string()));
                    obj.insert("error_kind".to_string(), json!(e.kind()));
                }
            }
        }
    }
    Json(response)
}

// ---------------------------------------------------------------------------
// ingestion
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct IngestRequest {
    repo_url: String,
    commit_hash: Option<String>,
}

async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngestRequest>,
) -> impl IntoResponse {
    match state
        .deps
        .ingest
        .submit(&body.repo_url, body.commit_hash)
        .await
    {
        Ok(job) => Json(json!({ "job_id": job.job_id, "status": job.status })).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string(), "error_kind": e.kind() })),
        )
            .into_response(),
    }
}

async fn ingest_status_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(job_id): AxumPath<String>,
) -> impl IntoResponse {
    match state.deps.ingest.status(&job_id) {
        Ok(job) => Json(json!({
            "job_id": job.job_id,
            "status": job.status,
            "result": job.result,
            "error": job.error,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// artifacts and history
// ---------------------------------------------------------------------------

async fn render_artifact_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(image_id) = params.get("image_id") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "image_id is required" })),
        )
            .into_response();
    };
    match state.deps.stores.artifacts.get(image_id) {
        Some(artifact) => Json(json!({
            "svg": artifact.svg,
            "image_id": artifact.artifact_id,
            "diagram_id": artifact.diagram_id,
            "ir_version": artifact.version,
            "renderer": artifact.renderer,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("artifact {} not found", image_id) })),
        )
            .into_response(),
    }
}

async fn history_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(image_id): AxumPath<String>,
) -> impl IntoResponse {
    // accept either a diagram id or an artifact id
    let diagram_id = state
        .deps
        .stores
        .artifacts
        .get(&image_id)
        .map(|a| a.diagram_id)
        .unwrap_or_else(|| archdraft_core::DiagramId::new(image_id.as_str()));

    match state.deps.ir.history(&diagram_id) {
        Ok(history) => Json(json!({ "diagram_id": diagram_id, "versions": history })).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// feedback
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FeedbackRequest {
    diagram_id: String,
    block_id: Option<String>,
    action: String,
    #[serde(default)]
    payload: Value,
    /// The version this edit was made against. A newer committed version
    /// fails the patch with STALE_PARENT and triggers a rebase plan.
    parent_version: Option<u64>,
}

/// Direct manipulation from the canvas: one patch op plus a re-render, run
/// as a persisted two-step plan.
async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FeedbackRequest>,
) -> impl IntoResponse {
    let session_id = SessionId::new(format!("feedback:{}", body.diagram_id));

    let mut op = json!({ "op": body.action.clone() });
    if let Some(obj) = op.as_object_mut() {
        if let Some(block_id) = &body.block_id {
            // ops address nodes, edges, or either; alias the block id to all
            obj.insert("block_id".to_string(), json!(block_id));
            obj.insert("node_id".to_string(), json!(block_id));
            obj.insert("edge_id".to_string(), json!(block_id));
        }
        if let Some(payload) = body.payload.as_object() {
            for (key, value) in payload {
                obj.insert(key.clone(), value.clone());
            }
        }
    }

    let diagram = body.diagram_id.clone();
    let steps = |patch_args: Value| {
        vec![
            PlanStep {
                tool_id: "apply_patch".to_string(),
                arguments: patch_args,
                rendering_service: None,
                llm_diagram: None,
                depends_on: Vec::new(),
            },
            PlanStep {
                tool_id: "render_diagram".to_string(),
                arguments: json!({ "diagram_id": diagram.clone() }),
                rendering_service: None,
                llm_diagram: None,
                depends_on: vec![0],
            },
        ]
    };

    let mut patch_args = json!({ "diagram_id": body.diagram_id.clone(), "ops": [op.clone()] });
    if let (Some(obj), Some(parent)) = (patch_args.as_object_mut(), body.parent_version) {
        obj.insert("parent_version".to_string(), json!(parent));
    }

    let (_plan, mut outcome) = run_tool_as_plan(
        &state,
        session_id.clone(),
        "feedback",
        steps(patch_args),
        &format!("feedback: {} on {}", body.action, body.diagram_id),
    )
    .await;

    let mut rebased = false;
    let stale = outcome
        .records
        .iter()
        .any(|r| r.output["error_kind"] == "STALE_PARENT");
    if stale {
        // the edit raced a newer version; rebase it onto the current latest
        let (_rebase_plan, rebase_outcome) = run_tool_as_plan(
            &state,
            session_id,
            "feedback_rebase",
            steps(json!({ "diagram_id": body.diagram_id.clone(), "ops": [op] })),
            &format!("rebase: {} on {}", body.action, body.diagram_id),
        )
        .await;
        outcome = rebase_outcome;
        rebased = true;
    }

    if let Some(failed) = outcome.records.iter().find(|r| {
        r.status != archdraft_core::ExecutionStatus::Ok
            && r.status != archdraft_core::ExecutionStatus::Skipped
    }) {
        return Json(json!({
            "status": "error",
            "error": failed.output["error"],
            "error_kind": failed.output["error_kind"],
            "rebased": rebased,
        }))
        .into_response();
    }

    let diagram_id = archdraft_core::DiagramId::new(body.diagram_id.as_str());
    let ir = state.deps.ir.latest(&diagram_id).ok();
    Json(json!({
        "status": "ok",
        "image_id": outcome.last_image_id,
        "ir": ir,
    }))
    .into_response()
}

// ---------------------------------------------------------------------------
// audits and plans
// ---------------------------------------------------------------------------

async fn audit_list_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> impl IntoResponse {
    let diagram_id = archdraft_core::DiagramId::new(id.as_str());
    let audits = state.deps.stores.audits.for_diagram(&diagram_id);
    Json(json!({ "diagram_id": diagram_id, "audits": audits }))
}

async fn audit_get_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((_id, audit_id)): AxumPath<(String, String)>,
) -> impl IntoResponse {
    match state.deps.stores.audits.get(&audit_id) {
        Some(audit) => Json(json!(audit)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("audit {} not found", audit_id) })),
        )
            .into_response(),
    }
}

async fn plan_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> impl IntoResponse {
    match state.deps.stores.plans.get(&id) {
        Some(plan) => {
            let executions = state.deps.stores.plans.executions(&id);
            Json(json!({ "plan": plan, "executions": executions })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("plan {} not found", id) })),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// mcp surface
// ---------------------------------------------------------------------------

async fn mcp_discover_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "tools": state.registry.catalog() }))
}

#[derive(Deserialize)]
struct McpExecuteRequest {
    tool_id: String,
    #[serde(default)]
    args: Value,
    session_id: Option<String>,
}

async fn mcp_execute_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<McpExecuteRequest>,
) -> impl IntoResponse {
    let session_id = body
        .session_id
        .map(SessionId::new)
        .unwrap_or_else(|| SessionId::new("mcp"));

    let steps = vec![PlanStep {
        tool_id: body.tool_id.clone(),
        arguments: body.args,
        rendering_service: None,
        llm_diagram: None,
        depends_on: Vec::new(),
    }];
    let (plan, outcome) = run_tool_as_plan(
        &state,
        session_id,
        "mcp_execute",
        steps,
        &format!("mcp: {}", body.tool_id),
    )
    .await;

    Json(json!({
        "plan_id": plan.plan_id,
        "execution": outcome.records.first().map(|r| &r.output),
    }))
}

// ---------------------------------------------------------------------------
// health
// ---------------------------------------------------------------------------

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.deps.stores.sessions.len(),
        "tools": state.registry.list().len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
