//! Archdraft LLM - the narrow completion contract
//!
//! One call shape: prompt in, schema-validated JSON out, deadline enforced.
//! Nothing downstream ever sees an unvalidated LLM byte.

pub mod anthropic;
pub mod client;
pub mod scripted;

pub use anthropic::AnthropicClient;
pub use client::{complete_with_schema, LlmClient, LlmError, LlmRequest, LlmResult};
pub use scripted::ScriptedClient;
