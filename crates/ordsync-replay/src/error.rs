//! Error types for ordsync-replay

use ordsync_common::{ConfigError, ServiceError};
use thiserror::Error;

/// Replay tool errors
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration values rejected by validation
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// Scenario file could not be parsed or is inconsistent
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// The reconcile service stopped before the scenario was sent
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The reconcile service task panicked
    #[error("Service task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Some change events never reached the output
    #[error("{0} events could not be written")]
    Output(usize),

    /// Event serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for replay operations
pub type Result<T> = std::result::Result<T, ReplayError>;
