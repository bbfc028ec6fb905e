//! Bus error types.

use thiserror::Error;

/// Errors from event bus operations.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// The in-flight publish ceiling was hit.
    #[error("bus backpressure: {in_flight} publishes in flight")]
    Backpressure {
        /// Publishes pending when the call was refused.
        in_flight: usize,
    },

    /// The backend is unreachable.
    #[error("bus unavailable: {0}")]
    Unavailable(String),

    /// A deadline elapsed.
    #[error("bus timeout during {0}")]
    Timeout(String),

    /// The topic does not exist and could not be created.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}

impl From<BusError> for ringforge_core::HubError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Backpressure { .. } => Self::Backpressure,
            BusError::Unavailable(msg) => Self::Unavailable(msg),
            BusError::Timeout(what) => Self::Timeout(what),
            BusError::UnknownTopic(topic) => Self::NotFound(format!("topic {topic}")),
        }
    }
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;
