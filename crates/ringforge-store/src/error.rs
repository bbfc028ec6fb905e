//! Store error types.

use thiserror::Error;

/// Errors from document store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The connection to the store is gone.
    #[error("store not connected")]
    NotConnected,

    /// A malformed frame was read off the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An I/O failure on the store connection.
    #[error("store i/o error: {0}")]
    Io(String),

    /// The remote store reported a failure.
    #[error("store rejected request: {0}")]
    Rejected(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
