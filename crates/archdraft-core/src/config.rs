//! Runtime configuration

use serde::{Deserialize, Serialize};

/// Bind mode for the gateway
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Loopback,
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            timeout_ms: 30_000,
            max_tokens: 8192,
        }
    }
}

/// Command lines for the containerized renderers. Each receives dialect text
/// on stdin and must write SVG to stdout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RendererConfig {
    pub mermaid: Vec<String>,
    pub structurizr: Vec<String>,
    pub plantuml: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mermaid: vec!["mmdc".into(), "--input".into(), "-".into(), "--outputFormat".into(), "svg".into()],
            structurizr: vec!["structurizr-cli".into(), "export".into(), "--format".into(), "svg".into()],
            plantuml: vec!["plantuml".into(), "-pipe".into(), "-tsvg".into()],
            timeout_ms: 20_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    pub workers: usize,
    pub clone_timeout_ms: u64,
    /// Deadline for a whole job; overruns mark it failed.
    pub job_timeout_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            clone_timeout_ms: 60_000,
            job_timeout_ms: 300_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub bind: BindMode,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub renderers: RendererConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Fraction of input lines that may carry blocked tokens before the
    /// sanitizer rejects the whole input with UNSAFE_INPUT.
    #[serde(default = "default_block_threshold")]
    pub sanitizer_block_threshold: f64,
}

fn default_port() -> u16 {
    8470
}

fn default_block_threshold() -> f64 {
    0.2
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind: BindMode::default(),
            port: default_port(),
            llm: LlmConfig::default(),
            renderers: RendererConfig::default(),
            ingest: IngestConfig::default(),
            sanitizer_block_threshold: default_block_threshold(),
        }
    }
}
