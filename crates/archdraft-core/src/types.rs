//! Core record types for Archdraft
//!
//! Plans, executions, styling audits, ingestion jobs, sessions, and rendered
//! artifacts. These are the shapes the stores persist; everything is serde
//! round-trippable and carries ISO8601 timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for SessionId {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> std::result::Result<S::Ok, S::Error> {
        ser.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(de).map(Self::new)
    }
}

/// Diagram identifier - stable across all versions of one diagram
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DiagramId(Arc<str>);

impl DiagramId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DiagramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DiagramId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for DiagramId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for DiagramId {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> std::result::Result<S::Ok, S::Error> {
        ser.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DiagramId {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(de).map(Self::new)
    }
}

/// Diagram source dialect
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    Plantuml,
    Mermaid,
    Structurizr,
}

impl DiagramFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramFormat::Plantuml => "plantuml",
            DiagramFormat::Mermaid => "mermaid",
            DiagramFormat::Structurizr => "structurizr",
        }
    }
}

impl std::fmt::Display for DiagramFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inline diagram payload carried by a plan step. The only place an
/// LLM-authored diagram text may travel; it is sanitized before any use.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LlmDiagram {
    pub format: DiagramFormat,
    pub diagram: String,
    pub schema_version: String,
}

/// One step of a plan. `depends_on` lists the indices of earlier steps this
/// step's preconditions require; a failure upstream skips it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanStep {
    pub tool_id: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendering_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_diagram: Option<LlmDiagram>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<usize>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Created,
    Executing,
    Executed,
    PartiallyExecuted,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub user_message: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of one planner pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanRecord {
    pub plan_id: String,
    pub session_id: SessionId,
    pub intent: String,
    pub steps: Vec<PlanStep>,
    pub metadata: PlanMetadata,
    pub executed: bool,
    pub status: PlanStatus,
}

impl PlanRecord {
    pub fn new(session_id: SessionId, intent: impl Into<String>, steps: Vec<PlanStep>, user_message: impl Into<String>) -> Self {
        Self {
            plan_id: uuid::Uuid::new_v4().to_string(),
            session_id,
            intent: intent.into(),
            steps,
            metadata: PlanMetadata {
                user_message: user_message.into(),
                created_at: Utc::now(),
            },
            executed: false,
            status: PlanStatus::Created,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Ok,
    Failed,
    Skipped,
}

/// One executed (or skipped) plan step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub plan_id: String,
    pub step_index: usize,
    pub tool_id: String,
    pub arguments: Value,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<String>,
    pub duration_ms: u64,
    pub status: ExecutionStatus,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    PreRender,
    PostSvg,
}

/// The before/after pair a styling audit carries. Exactly one shape exists
/// per audit; the enum makes the exclusive-or structural.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AuditArtifacts {
    PreRender {
        renderer_input_before: String,
        renderer_input_after: String,
    },
    PostSvg {
        svg_before: String,
        svg_after: String,
    },
}

/// Immutable record of one styling or sanitization operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StylingAudit {
    pub audit_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub diagram_id: DiagramId,
    pub mode: AuditMode,
    pub user_prompt: String,
    pub extracted_intent: String,
    pub styling_plan: Value,
    pub execution_steps: Vec<String>,
    pub agent_reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_diagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_diagram: Option<String>,
    pub validation_warnings: Vec<String>,
    pub blocked_tokens: Vec<String>,
    #[serde(flatten)]
    pub artifacts: AuditArtifacts,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Background ingestion job, cached by `(repo_url, commit_hash)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionJob {
    pub job_id: String,
    pub repo_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestionJob {
    pub fn queued(repo_url: impl Into<String>, commit_hash: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            repo_url: repo_url.into(),
            commit_hash,
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Chat message role
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// One chat session: an ordered message log plus the active diagram lineage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_diagram: Option<DiagramId>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            active_diagram: None,
            created_at: Utc::now(),
        }
    }
}

/// A rendered SVG bound to the IR version it was produced from. The
/// `structure_hash` is renderer-independent: two renders of the same IR
/// carry the same hash regardless of markup differences.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderedArtifact {
    pub artifact_id: String,
    pub diagram_id: DiagramId,
    pub version: u64,
    pub renderer: String,
    pub svg: String,
    pub structure_hash: String,
    pub created_at: DateTime<Utc>,
}
