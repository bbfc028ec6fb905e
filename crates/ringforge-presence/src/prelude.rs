//! Convenient re-exports.

pub use crate::registry::{PresencePatch, PresenceRegistry};
