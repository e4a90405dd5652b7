//! Runtime error types.

use lyre_core::{StoreError, TransportError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The script store could not be opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A bridge failed to start.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceExists(String),

    /// The instance no longer accepts events.
    #[error("Instance is not running: {0}")]
    InstanceStopped(String),

    /// A host-supplied event payload does not match its name.
    #[error("Invalid payload for event '{name}': {reason}")]
    InvalidEvent { name: String, reason: String },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
