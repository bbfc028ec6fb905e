//! RingForge Directory - Agent identity for the RingForge hub.
//!
//! This crate provides:
//! - [`DirectoryStore`], the interface to the relational schema layer, with
//!   an in-memory reference implementation
//! - [`AgentDirectory`], the service owning API key validation,
//!   register-or-reconnect upserts and Ed25519 key binding
//! - [`ChallengeStore`], the short-TTL proof-of-key table with its sweep

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod challenge;
mod directory;
mod stores;

pub use challenge::{ChallengeStore, DEFAULT_CHALLENGE_TTL, DEFAULT_SWEEP_INTERVAL};
pub use directory::{AgentDirectory, RegisterMeta};
pub use stores::{DirectoryStore, MemoryDirectoryStore};
