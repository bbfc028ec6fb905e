//! Telemetry errors.

use thiserror::Error;

/// Errors from telemetry setup and metric encoding.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A log filter directive failed to parse.
    #[error("invalid log directive: {0}")]
    InvalidDirective(String),

    /// The global subscriber was already installed.
    #[error("logging already initialized")]
    AlreadyInitialized,

    /// Metric registration or encoding failed.
    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
