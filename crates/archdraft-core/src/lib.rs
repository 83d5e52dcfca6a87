//! Archdraft Core - shared types, error taxonomy, stores, and configuration

pub mod config;
pub mod envelope;
pub mod error;
pub mod store;
pub mod types;

pub use config::*;
pub use envelope::*;
pub use error::{Error, Result};
pub use types::*;
