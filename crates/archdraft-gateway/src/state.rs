//! Application state wiring
//!
//! Everything long-lived is created here once at startup: stores, the IR
//! store, the tool registry (read-only afterward), the planner, and the
//! ingestion worker pool. Per-session serialization lives in the lock map.

use archdraft_agents::{Planner, StylingAgent};
use archdraft_core::store::Stores;
use archdraft_core::{RuntimeConfig, SessionId};
use archdraft_ingest::IngestQueue;
use archdraft_ir::IrStore;
use archdraft_llm::LlmClient;
use archdraft_mcp::{create_default_registry, McpRegistry, ToolDeps};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub struct AppState {
    pub deps: Arc<ToolDeps>,
    pub registry: Arc<McpRegistry>,
    pub planner: Arc<Planner>,
    /// One async mutex per session: at most one plan executes per session,
    /// concurrent messages queue behind it.
    session_locks: DashMap<SessionId, Arc<Mutex<()>>>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the whole runtime. Must run inside a tokio runtime (the
    /// ingestion pool spawns its workers here).
    pub fn build(config: RuntimeConfig, client: Arc<dyn LlmClient>) -> Arc<Self> {
        let stores = Stores::new();
        let styling = Arc::new(StylingAgent::new(client.clone(), config.llm.clone()));
        let ingest = IngestQueue::start(stores.jobs.clone(), config.ingest.clone());
        let planner = Arc::new(Planner::new(client, config.llm.clone()));

        let deps = Arc::new(ToolDeps {
            ir: Arc::new(IrStore::new()),
            stores,
            config,
            styling,
            ingest,
        });
        let registry = Arc::new(create_default_registry(deps.clone()));

        Arc::new(Self {
            deps,
            registry,
            planner,
            session_locks: DashMap::new(),
            started_at: Instant::now(),
        })
    }

    pub fn session_lock(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
