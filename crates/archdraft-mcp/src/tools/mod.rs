//! Builtin tools, one per file

pub mod analyze;
pub mod apply_patch;
pub mod apply_styling;
pub mod create_diagram;
pub mod explain;
pub mod ingest_repo;
pub mod render_diagram;

use crate::deps::ToolDeps;
use crate::registry::CallContext;
use archdraft_core::DiagramId;
use serde_json::Value;

/// Diagram targeted by a call: explicit argument first, then the session's
/// active lineage.
pub(crate) fn resolve_diagram_id(
    deps: &ToolDeps,
    args: &Value,
    ctx: &CallContext,
) -> Option<DiagramId> {
    if let Some(id) = args["diagram_id"].as_str() {
        return Some(DiagramId::new(id));
    }
    deps.stores
        .sessions
        .get(&ctx.session_id)
        .and_then(|s| s.active_diagram)
}
