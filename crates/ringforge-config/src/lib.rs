//! RingForge Config - Configuration for the RingForge coordination hub.
//!
//! This crate provides:
//! - [`HubConfig`] with every recognized option and production defaults
//! - TOML file loading with `RINGFORGE_*` environment overrides
//! - Validation of ranges and backend selection

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod loader;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use loader::load;
pub use types::{BusBackend, HubConfig, LogFormatOption, LoggingSection};
