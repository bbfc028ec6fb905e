//! Convenient re-exports.

pub use crate::routing::route_task;
pub use crate::scheduler::{SchedulerConfig, TaskScheduler, TaskSubmission};
pub use crate::store::TaskStore;
