//! Audit error types.

use thiserror::Error;

/// Errors from audit storage backends.
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    /// The backend could not persist the entry.
    #[error("audit storage error: {0}")]
    Storage(String),

    /// The entry could not be serialized.
    #[error("audit serialization error: {0}")]
    Serialization(String),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
