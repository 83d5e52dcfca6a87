//! Error taxonomy for Archdraft
//!
//! Every expected failure mode maps to one variant. Variants carry the
//! structured payload the chat surface and execution records need; the wire
//! kind string is stable and returned by [`Error::kind`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("validation failed: {}", reasons.join("; "))]
    ValidationFailed { reasons: Vec<String> },

    #[error("patch op '{op}' may not write path '{path}'")]
    PatchPathForbidden { op: String, path: String },

    #[error("stale parent for diagram {diagram_id}: latest is {latest}, caller supplied {supplied:?}")]
    StaleParent {
        diagram_id: String,
        latest: u64,
        supplied: Option<u64>,
    },

    #[error("unsafe input: {} token(s) blocked", blocked_tokens.len())]
    UnsafeInput { blocked_tokens: Vec<String> },

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("plan invalid: {0}")]
    PlanInvalid(String),

    #[error("llm timeout after {0}ms")]
    LlmTimeout(u64),

    #[error("upstream failed: {0}")]
    UpstreamFailed(String),

    #[error("skipped: depends on failed step {0}")]
    SkippedDueToUpstream(usize),

    #[error("ingest failed: {0}")]
    IngestFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("stale cache: {0}")]
    StaleCache(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable wire identifier for this error, as surfaced in envelopes and
    /// execution records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ValidationFailed { .. } => "VALIDATION_FAILED",
            Error::PatchPathForbidden { .. } => "PATCH_PATH_FORBIDDEN",
            Error::StaleParent { .. } => "STALE_PARENT",
            Error::UnsafeInput { .. } => "UNSAFE_INPUT",
            Error::UnsupportedFeature(_) => "UNSUPPORTED_FEATURE",
            Error::RenderFailed(_) => "RENDER_FAILED",
            Error::PlanInvalid(_) => "PLAN_INVALID",
            Error::LlmTimeout(_) => "LLM_TIMEOUT",
            Error::UpstreamFailed(_) => "UPSTREAM_FAILED",
            Error::SkippedDueToUpstream(_) => "SKIPPED_DUE_TO_UPSTREAM",
            Error::IngestFailed(_) => "INGEST_FAILED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::StaleCache(_) => "STALE_CACHE",
            Error::Internal(_) => "INTERNAL",
        }
    }

    pub fn validation(reasons: Vec<String>) -> Self {
        Self::ValidationFailed { reasons }
    }

    pub fn forbidden_path(op: impl Into<String>, path: impl Into<String>) -> Self {
        Self::PatchPathForbidden {
            op: op.into(),
            path: path.into(),
        }
    }

    pub fn unsafe_input(blocked_tokens: Vec<String>) -> Self {
        Self::UnsafeInput { blocked_tokens }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error is an expected, recoverable tool-boundary failure
    /// (recorded and surfaced in the envelope) as opposed to a runtime fault.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Error::Internal(_))
    }
}
