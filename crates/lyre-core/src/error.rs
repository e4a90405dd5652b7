//! Unified error types for the Lyre core.
//!
//! Script-facing operations never surface these directly: boolean operations
//! collapse them to `false`, and asynchronous bridges hand the `Display` form
//! to the completion callback. They exist so that hosts and transports can
//! propagate failures with `?` internally.

use thiserror::Error;

// =============================================================================
// Host Errors
// =============================================================================

/// Errors reported by the external host when a facade call cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The instance is not connected to its chat backend.
    #[error("instance is not connected")]
    NotConnected,

    /// The referenced entity does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Entity kind, e.g. `"client"` or `"channel"`.
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The operation is not available on the current backend.
    #[error("'{0}' is not supported by this backend")]
    Unsupported(&'static str),

    /// The host refused the request.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl HostError {
    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors that can occur in store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The value could not be converted to JSON.
    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file does not contain a JSON object.
    #[error("store file '{0}' is corrupt")]
    Corrupt(String),
}

// =============================================================================
// Codec Errors
// =============================================================================

/// Errors returned by the decoding helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Input was not valid base64.
    #[error("invalid base64 input: {0}")]
    Base64(String),

    /// Input was not valid hex.
    #[error("invalid hex input: {0}")]
    Hex(String),

    /// The decoded bytes are not valid UTF-8.
    #[error("decoded data is not valid UTF-8")]
    Utf8,
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors produced by the network, database and websocket bridges.
///
/// The `Display` output is what a script callback receives as its error
/// string.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {target} - {reason}")]
    ConnectionFailed {
        /// Host, URL or DSN that failed.
        target: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// The request parameters were rejected before any I/O happened.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The operation did not finish within its deadline.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// The remote side answered with a failure.
    #[error("request failed: {0}")]
    Request(String),

    /// A database driver reported an error.
    #[error("database error: {0}")]
    Database(String),

    /// No implementation was compiled in for this capability.
    #[error("capability '{capability}' not available")]
    NotAvailable {
        /// The missing capability.
        capability: &'static str,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for host calls.
pub type HostResult<T> = Result<T, HostError>;

/// Result type for store backends.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for bridge operations.
pub type TransportResult<T> = Result<T, TransportError>;
