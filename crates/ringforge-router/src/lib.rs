//! RingForge Router - The activity / direct-message / shared-memory pipeline.
//!
//! Three delivery scopes for activity (whole fleet, tag-matched, one agent),
//! direct messages with an offline queue in the document store, bounded
//! history replay from the event bus, and fleet-shared memory. Every
//! delivered event is also published to the bus asynchronously; bus failures
//! are logged and never fail the client action.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod activity;
mod direct;
mod history;
mod memory;
mod router;

pub use activity::{ActivityKind, ActivityScope};
pub use history::HistoryRequest;
pub use router::{MessageRouter, RouterConfig, SenderContext};
