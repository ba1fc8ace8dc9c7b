//! Error types for Stratloop
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Stratloop
#[derive(Debug, Error)]
pub enum StratloopError {
    /// Request could not be turned into a valid task spec
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// Capability name not present in the tool registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Model backend failed or produced nothing usable
    #[error("Generation error: {0}")]
    Generation(String),

    /// Price data could not be produced for the requested window
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Template rendering error
    #[error("Template error: {0}")]
    Template(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Stratloop operations
pub type Result<T> = std::result::Result<T, StratloopError>;
