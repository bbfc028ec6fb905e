//! RingForge Scheduler - Ephemeral tasks routed by capability.
//!
//! Tasks live in an in-memory store keyed by task ID with a daily submission
//! counter. The ticker runs every second: route pending tasks to eligible
//! agents, time out overdue work, purge old terminal rows. All status
//! transitions are conditional updates — compare expected status, then write
//! — serialized per row.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod routing;
mod scheduler;
mod store;

pub use routing::route_task;
pub use scheduler::{SchedulerConfig, TaskScheduler, TaskSubmission};
pub use store::TaskStore;
