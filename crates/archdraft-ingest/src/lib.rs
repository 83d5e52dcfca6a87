//! Archdraft Ingest - background repository ingestion
//!
//! Fetches a repository, extracts its structure without reading function
//! bodies, and emits a structural IR with honest confidence values. Jobs run
//! on a worker pool detached from any chat request; results are cached by
//! `(repo_url, commit)`.

pub mod extract;
pub mod github;
pub mod queue;

pub use extract::{extract_structure, RepoStructure};
pub use github::{clone_shallow, validate_repo_url};
pub use queue::IngestQueue;
