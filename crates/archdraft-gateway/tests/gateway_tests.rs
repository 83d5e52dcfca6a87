//! End-to-end tests for the gateway: scripted planner, stub renderer
//! process, real stores. Covers the seed chat scenarios and the read
//! surface.

use archdraft_core::{BlockType, DiagramId, ResponseType, RuntimeConfig, SessionId};
use archdraft_gateway::{build_router, handle_chat, AppState};
use archdraft_llm::ScriptedClient;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn stub_renderer() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        "cat >/dev/null; echo '<svg xmlns=\"http://www.w3.org/2000/svg\"><text>ok</text></svg>'"
            .to_string(),
    ]
}

fn scripted_state(responses: Vec<String>) -> Arc<AppState> {
    let mut config = RuntimeConfig::default();
    config.renderers.mermaid = stub_renderer();
    config.renderers.structurizr = stub_renderer();
    config.renderers.plantuml = stub_renderer();
    config.renderers.timeout_ms = 5_000;
    config.llm.timeout_ms = 1_000;
    AppState::build(config, Arc::new(ScriptedClient::new(responses)))
}

/// Planner script for "generate a component diagram": explain, create,
/// render.
fn generation_plan() -> String {
    json!({
        "intent": "generate_component_diagram",
        "steps": [
            {
                "tool_id": "explain",
                "arguments": {"text": "Here is a component diagram of the flow you described."}
            },
            {
                "tool_id": "create_diagram",
                "arguments": {
                    "diagram_type": "component",
                    "nodes": [
                        {"id": "user", "label": "User", "type": "actor"},
                        {"id": "api", "label": "API", "type": "container"},
                        {"id": "service", "label": "Service", "type": "component"},
                        {"id": "db", "label": "DB", "type": "data_store"}
                    ],
                    "edges": [
                        {"from": "user", "to": "api", "rel_type": "sync"},
                        {"from": "api", "to": "service", "rel_type": "sync"},
                        {"from": "service", "to": "db", "rel_type": "data_flow"}
                    ]
                }
            },
            {"tool_id": "render_diagram", "arguments": {}, "depends_on": [1]}
        ]
    })
    .to_string()
}

async fn json_request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn active_diagram(state: &AppState, session: &SessionId) -> DiagramId {
    state
        .deps
        .stores
        .sessions
        .get(session)
        .and_then(|s| s.active_diagram)
        .expect("session has an active diagram")
}

// ===========================================================================
// Scenario 1: initial generation
// ===========================================================================

#[tokio::test]
async fn chat_generates_text_and_diagram_blocks() {
    let state = scripted_state(vec![generation_plan()]);
    let session = SessionId::new("s1");

    let envelope = handle_chat(
        &state,
        session.clone(),
        "Generate a component diagram for User -> API -> Service -> DB",
    )
    .await;

    assert_eq!(envelope.response_type, ResponseType::Mixed);
    let text_blocks = envelope
        .blocks
        .iter()
        .filter(|b| b.block_type == BlockType::Text)
        .count();
    let diagram_blocks = envelope
        .blocks
        .iter()
        .filter(|b| b.block_type == BlockType::Diagram)
        .count();
    assert_eq!(text_blocks, 1);
    assert_eq!(diagram_blocks, 1);
    assert_eq!(envelope.state.ir_version, Some(1));
    assert!(envelope.state.has_diagram);
    assert!((envelope.confidence - 1.0).abs() < f64::EPSILON);

    let ir = state
        .deps
        .ir
        .latest(&active_diagram(&state, &session))
        .unwrap();
    assert_eq!(ir.nodes.len(), 4);
    assert_eq!(ir.edges.len(), 3);
    assert!(ir
        .edges
        .iter()
        .all(|e| matches!(e.rel_type, archdraft_ir::RelType::Sync | archdraft_ir::RelType::DataFlow)));
}

#[tokio::test]
async fn plan_record_and_executions_are_persisted() {
    let state = scripted_state(vec![generation_plan()]);
    handle_chat(&state, SessionId::new("s1"), "generate").await;

    let plan_ids = state.deps.stores.plans.list();
    assert_eq!(plan_ids.len(), 1);
    let plan_id = plan_ids[0].clone();

    let app = build_router(state);
    let (status, body) = json_request(&app, "GET", &format!("/api/plans/{}", plan_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"]["status"], "executed");
    assert_eq!(body["plan"]["executed"], true);
    assert_eq!(body["executions"].as_array().unwrap().len(), 3);
    assert!(body["executions"]
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["status"] == "ok"));
}

// ===========================================================================
// Scenario 2: rename via feedback patch
// ===========================================================================

#[tokio::test]
async fn feedback_renames_node_and_extends_history() {
    let state = scripted_state(vec![generation_plan()]);
    let session = SessionId::new("s1");
    handle_chat(&state, session.clone(), "generate").await;
    let diagram_id = active_diagram(&state, &session);

    let app = build_router(state.clone());
    let (status, body) = json_request(
        &app,
        "POST",
        "/api/feedback",
        Some(json!({
            "diagram_id": diagram_id.as_str(),
            "block_id": "api",
            "action": "edit_text",
            "payload": {"text": "Auth Service"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["image_id"].is_string());
    assert_eq!(body["ir"]["version"], 2);
    assert_eq!(body["ir"]["parent_version"], 1);

    let ir = state.deps.ir.latest(&diagram_id).unwrap();
    assert_eq!(ir.node("api").unwrap().label, "Auth Service");

    let (status, body) = json_request(
        &app,
        "GET",
        &format!("/api/ir/{}/history", diagram_id.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let versions = body["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["version"], 2);
    assert_eq!(versions[1]["version"], 1);
}

// ===========================================================================
// Scenario 3: renderer swap keeps neutral structure
// ===========================================================================

#[tokio::test]
async fn renderer_override_changes_markup_not_structure() {
    let state = scripted_state(vec![generation_plan()]);
    let session = SessionId::new("s1");
    handle_chat(&state, session.clone(), "generate").await;
    let diagram_id = active_diagram(&state, &session);

    let steps = |service: Option<&str>| {
        vec![archdraft_core::PlanStep {
            tool_id: "render_diagram".to_string(),
            arguments: json!({ "diagram_id": diagram_id.as_str() }),
            rendering_service: service.map(String::from),
            llm_diagram: None,
            depends_on: Vec::new(),
        }]
    };

    let (_p1, first) = archdraft_gateway::run_tool_as_plan(
        &state,
        session.clone(),
        "render",
        steps(None),
        "render default",
    )
    .await;
    let (_p2, second) = archdraft_gateway::run_tool_as_plan(
        &state,
        session,
        "render",
        steps(Some("plantuml")),
        "render plantuml",
    )
    .await;

    let a = state
        .deps
        .stores
        .artifacts
        .get(first.last_image_id.as_deref().unwrap())
        .unwrap();
    let b = state
        .deps
        .stores
        .artifacts
        .get(second.last_image_id.as_deref().unwrap())
        .unwrap();
    assert_ne!(a.artifact_id, b.artifact_id);
    assert_ne!(a.renderer, b.renderer);
    assert_eq!(a.structure_hash, b.structure_hash);
}

// ===========================================================================
// Scenario 4: unsafe LLM diagram is sanitized, audited, never rendered
// ===========================================================================

#[tokio::test]
async fn unsafe_llm_diagram_yields_unsafe_input_block() {
    let unsafe_plan = json!({
        "intent": "render_llm_diagram",
        "steps": [{
            "tool_id": "render_diagram",
            "arguments": {},
            "llm_diagram": {
                "format": "plantuml",
                "diagram": "@startuml\n!include https://evil/x.puml\n@enduml",
                "schema_version": "1"
            }
        }]
    });
    let state = scripted_state(vec![unsafe_plan.to_string()]);
    let session = SessionId::new("s1");

    let envelope = handle_chat(&state, session.clone(), "render this diagram").await;
    assert_eq!(envelope.response_type, ResponseType::Text);
    let text = envelope.blocks[0].payload["text"].as_str().unwrap();
    assert!(text.contains("UNSAFE_INPUT"), "got: {}", text);
    assert!(!envelope.state.has_diagram);

    // the audit kept the original and the blocked token; nothing rendered
    let audits = state.deps.stores.audits.all();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].blocked_tokens, vec!["!include"]);
    assert!(audits[0]
        .llm_diagram
        .as_ref()
        .unwrap()
        .contains("!include"));
}

// ===========================================================================
// Scenario 5: background ingestion over HTTP
// ===========================================================================

async fn init_git_repo(root: &std::path::Path) -> bool {
    std::fs::create_dir_all(root.join("api")).unwrap();
    std::fs::write(root.join("README.md"), "# demo").unwrap();
    std::fs::write(root.join("api/index.js"), "const fs = require('fs');\n").unwrap();
    for args in [
        vec!["init", "--quiet"],
        vec!["add", "."],
        vec![
            "-c",
            "user.email=t@t",
            "-c",
            "user.name=t",
            "commit",
            "--quiet",
            "-m",
            "init",
        ],
    ] {
        let ok = tokio::process::Command::new("git")
            .args(&args)
            .current_dir(root)
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false);
        if !ok {
            return false;
        }
    }
    true
}

#[tokio::test]
async fn ingest_endpoint_queues_polls_and_caches() {
    let repo = std::env::temp_dir().join(format!(
        "archdraft-gateway-ingest-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&repo).unwrap();
    if !init_git_repo(&repo).await {
        let _ = std::fs::remove_dir_all(&repo);
        return;
    }
    let url = format!("file://{}", repo.display());

    let state = scripted_state(vec![]);
    let app = build_router(state);

    let (status, body) = json_request(
        &app,
        "POST",
        "/api/ingest",
        Some(json!({ "repo_url": url })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let mut last = Value::Null;
    for _ in 0..200 {
        let (_, poll) =
            json_request(&app, "GET", &format!("/api/ingest/{}", job_id), None).await;
        last = poll;
        let status = last["status"].as_str().unwrap_or_default().to_string();
        if status == "complete" || status == "failed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert_eq!(last["status"], "complete", "error: {}", last["error"]);
    assert!(last["result"]["ir"]["nodes"].as_array().unwrap().len() >= 1);

    // a second identical request returns the cached job without re-cloning
    let (_, again) = json_request(
        &app,
        "POST",
        "/api/ingest",
        Some(json!({ "repo_url": url })),
    )
    .await;
    assert_eq!(again["job_id"].as_str().unwrap(), job_id);
    assert_eq!(again["status"], "complete");

    let _ = std::fs::remove_dir_all(&repo);
}

// ===========================================================================
// Scenario 6: stale parent triggers a rebase plan
// ===========================================================================

#[tokio::test]
async fn concurrent_feedback_rebases_stale_edit() {
    let state = scripted_state(vec![generation_plan()]);
    let session = SessionId::new("s1");
    handle_chat(&state, session.clone(), "generate").await;
    let diagram_id = active_diagram(&state, &session);
    let app = build_router(state.clone());

    // both tabs edit against version 1
    let (_, first) = json_request(
        &app,
        "POST",
        "/api/feedback",
        Some(json!({
            "diagram_id": diagram_id.as_str(),
            "block_id": "api",
            "action": "edit_text",
            "payload": {"text": "Gateway"},
            "parent_version": 1
        })),
    )
    .await;
    assert_eq!(first["status"], "ok");
    assert_eq!(first["ir"]["version"], 2);

    let (_, second) = json_request(
        &app,
        "POST",
        "/api/feedback",
        Some(json!({
            "diagram_id": diagram_id.as_str(),
            "block_id": "service",
            "action": "edit_text",
            "payload": {"text": "Billing Service"},
            "parent_version": 1
        })),
    )
    .await;
    // the stale edit was rebased onto version 2 and committed as version 3
    assert_eq!(second["status"], "ok", "body: {}", second);
    assert_eq!(second["ir"]["version"], 3);

    let ir = state.deps.ir.latest(&diagram_id).unwrap();
    assert_eq!(ir.node("api").unwrap().label, "Gateway");
    assert_eq!(ir.node("service").unwrap().label, "Billing Service");
    assert_eq!(state.deps.ir.history(&diagram_id).unwrap().len(), 3);
}

// ===========================================================================
// Planner failure modes and the rest of the surface
// ===========================================================================

#[tokio::test]
async fn invalid_plan_becomes_text_envelope() {
    // schema violation: steps is a string
    let state = scripted_state(vec![r#"{"intent":"x","steps":"nope"}"#.to_string()]);
    let envelope = handle_chat(&state, SessionId::new("s1"), "hello").await;
    assert_eq!(envelope.response_type, ResponseType::Text);
    assert!(envelope.blocks[0].payload["text"]
        .as_str()
        .unwrap()
        .contains("PLAN_INVALID"));
}

#[tokio::test]
async fn render_failure_invites_retry_action() {
    let mut config = RuntimeConfig::default();
    // a renderer that always fails
    config.renderers.structurizr = vec!["false".to_string()];
    config.renderers.mermaid = stub_renderer();
    config.renderers.plantuml = stub_renderer();
    config.llm.timeout_ms = 1_000;
    let state = AppState::build(
        config,
        Arc::new(ScriptedClient::new(vec![generation_plan()])),
    );

    let envelope = handle_chat(&state, SessionId::new("s1"), "generate").await;
    let action = envelope
        .blocks
        .iter()
        .find(|b| b.block_type == BlockType::Action)
        .expect("render failure produces an action block");
    assert_eq!(action.payload["action"], "retry_render");
    assert!(envelope.confidence < 1.0);
}

#[tokio::test]
async fn session_surface_round_trips() {
    let state = scripted_state(vec![generation_plan()]);
    let app = build_router(state.clone());

    let (status, created) = json_request(&app, "POST", "/api/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    let session_id = created["session_id"].as_str().unwrap().to_string();

    let (_, chat) = json_request(
        &app,
        "POST",
        "/api/chat",
        Some(json!({ "message": "generate", "session_id": session_id })),
    )
    .await;
    assert_eq!(chat["session_id"].as_str().unwrap(), session_id);

    let (status, session) =
        json_request(&app, "GET", &format!("/api/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["messages"].as_array().unwrap().len(), 2);
    assert!(session["active_diagram"].is_string());
    assert_eq!(session["diagrams"].as_array().unwrap().len(), 1);

    let (status, _) = json_request(&app, "GET", "/api/sessions/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn artifact_endpoint_serves_svg() {
    let state = scripted_state(vec![generation_plan()]);
    let session = SessionId::new("s1");
    let envelope = handle_chat(&state, session, "generate").await;
    let image_id = envelope
        .blocks
        .iter()
        .find(|b| b.block_type == BlockType::Diagram)
        .and_then(|b| b.payload["image_id"].as_str())
        .unwrap()
        .to_string();

    let app = build_router(state);
    let (status, body) = json_request(
        &app,
        "GET",
        &format!("/api/diagram/render?format=svg&image_id={}", image_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["svg"].as_str().unwrap().contains("<svg"));

    let (status, _) = json_request(&app, "GET", "/api/diagram/render", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn styling_audit_surface_lists_audits() {
    let styled = json!({
        "mode": "patch_ops",
        "intent": "calm",
        "reasoning": "set mood",
        "patch_ops": [
            {"op": "style", "scope": "global_intent", "intent": {"mood": "calm"}}
        ]
    });
    let styling_plan = json!({
        "intent": "style_diagram",
        "steps": [{"tool_id": "apply_styling", "arguments": {"suggestion": "make it calm"}}]
    });
    let state = scripted_state(vec![generation_plan(), styling_plan.to_string(), styled.to_string()]);
    let session = SessionId::new("s1");
    handle_chat(&state, session.clone(), "generate").await;
    handle_chat(&state, session.clone(), "make it calm").await;

    let diagram_id = active_diagram(&state, &session);
    let app = build_router(state);
    let (status, body) = json_request(
        &app,
        "GET",
        &format!("/api/diagrams/{}/styling/audit", diagram_id.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let audits = body["audits"].as_array().unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0]["mode"], "pre_render");
    assert!(audits[0]["renderer_input_before"].is_string());
    assert!(audits[0]["renderer_input_after"].is_string());
    assert!(audits[0].get("svg_before").is_none());

    let audit_id = audits[0]["audit_id"].as_str().unwrap();
    let (status, one) = json_request(
        &app,
        "GET",
        &format!(
            "/api/diagrams/{}/styling/audit/{}",
            diagram_id.as_str(),
            audit_id
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["audit_id"], audit_id);
}

#[tokio::test]
async fn mcp_surface_discovers_and_executes() {
    let state = scripted_state(vec![]);
    let app = build_router(state);

    let (status, body) = json_request(&app, "POST", "/mcp/discover", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["tools"].as_array().unwrap().len() >= 7);

    let (status, body) = json_request(
        &app,
        "POST",
        "/mcp/execute",
        Some(json!({ "tool_id": "explain", "args": {"text": "hi"} })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["plan_id"].is_string());
    assert_eq!(body["execution"]["success"], true);
    assert_eq!(body["execution"]["payload"]["text"], "hi");
}

#[tokio::test]
async fn health_reports_tool_count() {
    let state = scripted_state(vec![]);
    let app = build_router(state);
    let (status, body) = json_request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["tools"].as_u64().unwrap() >= 7);
}
