//! Archdraft - AI-assisted diagram authoring runtime

use archdraft_core::{BindMode, RuntimeConfig};
use archdraft_gateway::start_gateway;
use archdraft_llm::AnthropicClient;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "archdraft", about = "Archdraft diagram authoring runtime")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        #[arg(short, long, default_value = "8470")]
        port: u16,
        #[arg(short, long, default_value = "loopback")]
        bind: String,
        /// LLM model for the planner and styling agent
        #[arg(short, long)]
        model: Option<String>,
        /// Per-call LLM deadline in milliseconds
        #[arg(long)]
        llm_timeout_ms: Option<u64>,
        /// Renderer subprocess deadline in milliseconds
        #[arg(long)]
        render_timeout_ms: Option<u64>,
        /// Ingestion worker count
        #[arg(long)]
        ingest_workers: Option<usize>,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve {
            port,
            bind,
            model,
            llm_timeout_ms,
            render_timeout_ms,
            ingest_workers,
        }) => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "archdraft=info,tower_http=info".into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let mut config = RuntimeConfig {
                port,
                bind: match bind.as_str() {
                    "lan" | "0.0.0.0" => BindMode::Lan,
                    _ => BindMode::Loopback,
                },
                ..RuntimeConfig::default()
            };
            if let Some(model) = model.or_else(|| std::env::var("ARCHDRAFT_MODEL").ok()) {
                config.llm.model = model;
            }
            if let Some(timeout) = llm_timeout_ms {
                config.llm.timeout_ms = timeout;
            }
            if let Some(timeout) = render_timeout_ms {
                config.renderers.timeout_ms = timeout;
            }
            if let Some(workers) = ingest_workers {
                config.ingest.workers = workers;
            }

            let api_key = std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY not set"))?;
            let client = Arc::new(AnthropicClient::new(api_key));

            start_gateway(config, client).await?;
        }

        Some(Commands::Version) | None => {
            println!("archdraft v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
