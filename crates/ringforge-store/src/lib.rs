//! RingForge Store - Document store interface for the hub.
//!
//! The content-addressed document store is an external collaborator; the hub
//! uses it as an opaque key → (meta, body) map for the offline direct-message
//! queue and shared memory. This crate provides:
//! - The [`DocumentStore`] trait with an in-memory reference implementation
//! - The wire protocol between core and store: length-prefixed frames with
//!   64-bit request IDs correlating replies
//! - A client speaking that protocol over any byte stream, and a serve loop
//!   exposing any [`DocumentStore`] on the other end

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod memory;
mod remote;
mod store;
pub mod wire;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryDocumentStore;
pub use remote::{serve, RemoteDocumentStore};
pub use store::{Document, DocumentStore};
