//! LLM client trait and the schema-validated completion wrapper

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("schema violation: {}", errors.join("; "))]
    SchemaViolation { errors: Vec<String> },

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            max_tokens: 8192,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// The completion contract. Implementations return the raw assistant text;
/// validation and deadlines live in [`complete_with_schema`] so every
/// provider gets them for free.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: LlmRequest) -> LlmResult<String>;
}

/// Complete with an enforced deadline and JSON-Schema validation of the
/// output. The only entry point agents use.
pub async fn complete_with_schema(
    client: &dyn LlmClient,
    request: LlmRequest,
    schema: &Value,
    timeout_ms: u64,
) -> LlmResult<Value> {
    let text = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        client.complete(request),
    )
    .await
    .map_err(|_| LlmError::Timeout(timeout_ms))??;

    let value = parse_json_output(&text)?;
    validate_value(schema, &value)?;
    Ok(value)
}

/// Extract the JSON document from assistant text. Models occasionally wrap
/// output in markdown fences or lead with prose; take the outermost object.
pub fn parse_json_output(text: &str) -> LlmResult<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let inner = strip_fences(trimmed);
    if let Ok(value) = serde_json::from_str(inner) {
        return Ok(value);
    }

    // last resort: first '{' to last '}'
    if let (Some(start), Some(end)) = (inner.find('{'), inner.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&inner[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(LlmError::InvalidResponse(format!(
        "no JSON document in output ({} chars)",
        text.len()
    )))
}

fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let without_open = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    without_open
        .trim()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Validate a value against a JSON Schema, collecting every violation.
pub fn validate_value(schema: &Value, value: &Value) -> LlmResult<()> {
    let compiled = JSONSchema::compile(schema)
        .map_err(|e| LlmError::InvalidResponse(format!("bad schema: {}", e)))?;
    let result = compiled.validate(value);
    if let Err(errors) = result {
        let errors: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(LlmError::SchemaViolation { errors });
    }
    Ok(())
}
