//! Archdraft MCP - the tool registry and its builtin tools
//!
//! Every capability in the runtime is a tool behind one execute entry point.
//! Each tool is a self-contained module implementing the McpTool trait; the
//! registry validates arguments and outputs against the tool's schemas and
//! refuses re-entry within a plan trace.

pub mod deps;
pub mod registry;
pub mod tools;

pub use deps::ToolDeps;
pub use registry::{CallContext, McpRegistry, McpTool, ToolDescriptor, ToolEnvelope, ToolMode, ToolOutput};

use std::sync::Arc;

/// Create the default registry with all builtin tools.
///
/// Edit this function to add or remove capabilities. The registry is built
/// once at startup and read-only afterward.
pub fn create_default_registry(deps: Arc<ToolDeps>) -> McpRegistry {
    let mut registry = McpRegistry::new();

    // --- pure transforms ---
    registry.register(tools::explain::ExplainTool::new());
    registry.register(tools::create_diagram::CreateDiagramTool::new(deps.clone()));
    registry.register(tools::apply_patch::ApplyPatchTool::new(deps.clone()));
    registry.register(tools::apply_styling::ApplyStylingTool::new(deps.clone()));

    // --- render ---
    registry.register(tools::render_diagram::RenderDiagramTool::new(deps.clone()));

    // --- analyze ---
    registry.register(tools::analyze::AnalyzeTool::new(deps.clone()));

    // --- ingest ---
    registry.register(tools::ingest_repo::IngestRepoTool::new(deps));

    registry
}
