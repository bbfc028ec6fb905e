//! RingForge Telemetry - Logging and metrics for the RingForge hub.
//!
//! This crate provides:
//! - Configurable logging setup over the tracing ecosystem
//! - The Prometheus metric registry served at `GET /metrics`

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;
mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{setup_logging, LogConfig, LogFormat};
pub use metrics::HubMetrics;
