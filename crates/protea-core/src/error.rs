use thiserror::Error;

/// Top-level error type for the Protea service.
///
/// Storage and configuration failures flow through this type so that the `?`
/// operator works across the core, storage, and API crates. The chat crate
/// keeps its own agent-facing errors and converts at its boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProteaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Interrupted: {0}")]
    Interrupted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ProteaError {
    fn from(err: toml::de::Error) -> Self {
        ProteaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ProteaError {
    fn from(err: toml::ser::Error) -> Self {
        ProteaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ProteaError {
    fn from(err: serde_json::Error) -> Self {
        ProteaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Protea operations.
pub type Result<T> = std::result::Result<T, ProteaError>;
