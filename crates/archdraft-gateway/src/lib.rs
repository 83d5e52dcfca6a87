//! Archdraft Gateway - HTTP surface and orchestration
//!
//! One orchestration endpoint drives everything: a chat message becomes a
//! persisted plan, the plan becomes sequential tool executions, and the
//! executions become a unified response envelope. The rest of the surface is
//! reads over the stores plus the ingestion endpoints.

pub mod orchestrator;
pub mod server;
pub mod state;

pub use orchestrator::{execute_plan, handle_chat, run_tool_as_plan};
pub use server::{build_router, start_gateway};
pub use state::AppState;
