//! Error types for media-source-engine
//!
//! Connection failures, stale deliveries and missing data are not errors:
//! they show up as absent values in the published nodes. What remains here
//! are failures of explicit requests made to the engine.

use thiserror::Error;

use crate::model::PackageName;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The selection store does not know the requested source
    #[error("Unknown media source: {0}")]
    UnknownSource(PackageName),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The engine was shut down
    #[error("Engine has been shut down")]
    ShutDown,
}
