//! Shared tool dependencies
//!
//! Tools run in-process against the same stores the gateway owns. They get
//! this bundle at registration time; per-call state travels in CallContext.

use archdraft_agents::StylingAgent;
use archdraft_core::store::Stores;
use archdraft_core::RuntimeConfig;
use archdraft_ingest::IngestQueue;
use archdraft_ir::IrStore;
use std::sync::Arc;

pub struct ToolDeps {
    pub ir: Arc<IrStore>,
    pub stores: Stores,
    pub config: RuntimeConfig,
    pub styling: Arc<StylingAgent>,
    pub ingest: Arc<IngestQueue>,
}
