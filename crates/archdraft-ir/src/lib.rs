//! Archdraft IR - the renderer-agnostic diagram model and its version graph
//!
//! Everything downstream of the planner speaks this model: the validator
//! gates every write, the patch engine is the only sanctioned mutation path,
//! and the store keeps an append-only version DAG per diagram.

pub mod model;
pub mod patch;
pub mod store;
pub mod validate;

pub use model::*;
pub use patch::{apply_patch, PatchOp, PatchSummary, StylePath};
pub use store::IrStore;
pub use validate::{check, validate_strict};
