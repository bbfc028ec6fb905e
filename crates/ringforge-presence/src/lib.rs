//! RingForge Presence - The fleet-scoped roster of connected agents.
//!
//! A mapping `fleet_id → agent_id → [PresenceEntry]` with a diff stream per
//! fleet topic. Entries are created when a session joins, mutated only
//! through `presence:update`, and destroyed when the socket dies. An agent
//! connected over several sockets has several entries; the registry surfaces
//! the list. Presence is eventually consistent across replicas — diffs ride
//! the pub/sub substrate and entries die with their socket.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod registry;

pub use registry::{PresencePatch, PresenceRegistry};
