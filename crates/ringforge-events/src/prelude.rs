//! Convenient re-exports.

pub use crate::broker::{InProcessBroker, StreamingBroker, TopicSpec};
pub use crate::bus::{EventBus, ReplayOptions, SubscribeOptions};
pub use crate::error::{BusError, BusResult};
pub use crate::local::LocalBus;
pub use crate::pubsub::{PubSub, SubscriberId};
pub use crate::streaming::{StreamingBus, StreamingConfig};
