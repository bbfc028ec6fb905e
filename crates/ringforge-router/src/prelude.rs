//! Convenient re-exports.

pub use crate::activity::{ActivityKind, ActivityScope};
pub use crate::history::HistoryRequest;
pub use crate::router::{MessageRouter, RouterConfig, SenderContext};
