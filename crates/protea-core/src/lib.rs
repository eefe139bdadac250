//! Protea core crate - shared error type, configuration, and protein record types.

pub mod config;
pub mod error;
pub mod types;

pub use config::ProteaConfig;
pub use error::{ProteaError, Result};
