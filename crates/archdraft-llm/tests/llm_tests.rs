//! Tests for archdraft-llm: JSON extraction, schema validation, deadlines

use archdraft_llm::*;
use serde_json::json;
use std::time::Duration;

fn plan_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["intent", "steps"],
        "properties": {
            "intent": {"type": "string"},
            "steps": {"type": "array", "items": {"type": "object"}}
        }
    })
}

// ===========================================================================
// JSON extraction
// ===========================================================================

#[test]
fn parses_bare_json() {
    let v = client::parse_json_output(r#"{"intent":"x","steps":[]}"#).unwrap();
    assert_eq!(v["intent"], "x");
}

#[test]
fn parses_fenced_json() {
    let text = "```json\n{\"intent\":\"x\",\"steps\":[]}\n```";
    let v = client::parse_json_output(text).unwrap();
    assert_eq!(v["intent"], "x");
}

#[test]
fn parses_json_with_leading_prose() {
    let text = "Here is the plan you asked for:\n{\"intent\":\"x\",\"steps\":[]}";
    let v = client::parse_json_output(text).unwrap();
    assert_eq!(v["intent"], "x");
}

#[test]
fn rejects_non_json() {
    assert!(client::parse_json_output("I cannot help with that.").is_err());
}

// ===========================================================================
// Schema validation
// ===========================================================================

#[test]
fn validates_conforming_value() {
    let value = json!({"intent": "generate", "steps": []});
    assert!(client::validate_value(&plan_schema(), &value).is_ok());
}

#[test]
fn collects_all_violations() {
    let value = json!({"steps": "not-an-array"});
    let err = client::validate_value(&plan_schema(), &value).unwrap_err();
    match err {
        LlmError::SchemaViolation { errors } => assert!(!errors.is_empty()),
        other => panic!("expected SchemaViolation, got {:?}", other),
    }
}

// ===========================================================================
// complete_with_schema
// ===========================================================================

#[tokio::test]
async fn scripted_completion_validates() {
    let client = ScriptedClient::new(vec![r#"{"intent":"generate","steps":[]}"#]);
    let value = complete_with_schema(
        &client,
        LlmRequest::new("test-model", "make a diagram"),
        &plan_schema(),
        1_000,
    )
    .await
    .unwrap();
    assert_eq!(value["intent"], "generate");
    assert_eq!(client.prompts(), vec!["make a diagram".to_string()]);
}

#[tokio::test]
async fn schema_violation_surfaces() {
    let client = ScriptedClient::new(vec![r#"{"steps":[]}"#]);
    let err = complete_with_schema(
        &client,
        LlmRequest::new("test-model", "p"),
        &plan_schema(),
        1_000,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LlmError::SchemaViolation { .. }));
}

#[tokio::test]
async fn deadline_is_enforced() {
    let client = ScriptedClient::new(vec![r#"{"intent":"x","steps":[]}"#])
        .with_delay(Duration::from_millis(200));
    let err = complete_with_schema(
        &client,
        LlmRequest::new("test-model", "p"),
        &plan_schema(),
        20,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LlmError::Timeout(20)));
}

#[tokio::test]
async fn script_repeats_last_response() {
    let client = ScriptedClient::new(vec!["{\"a\":1}"]);
    for _ in 0..3 {
        let out = client
            .complete(LlmRequest::new("m", "p"))
            .await
            .unwrap();
        assert_eq!(out, "{\"a\":1}");
    }
}
