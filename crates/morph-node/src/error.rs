//! Node error types

use thiserror::Error;

/// Node error type
#[derive(Debug, Error)]
pub enum NodeError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Batch or config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed batch file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed config file
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;
