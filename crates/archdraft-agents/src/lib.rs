//! Archdraft Agents - the Planner and the Styling Agent
//!
//! Both are pure transformation agents: one LLM call in, schema-validated
//! JSON out, deterministic fallbacks on deviation. Neither holds a handle to
//! the orchestrator, the registry, or any store; capability restriction is
//! by construction.

pub mod planner;
pub mod schemas;
pub mod styling;

pub use planner::{Planner, PlannerContext, ToolSummary};
pub use styling::{merge_updated_ir, StylingAgent, StylingMode, StylingOutcome, StylingRun};
