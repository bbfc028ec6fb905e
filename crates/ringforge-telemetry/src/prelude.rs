//! Convenient re-exports.

pub use crate::logging::{setup_logging, LogConfig, LogFormat};
pub use crate::metrics::HubMetrics;
