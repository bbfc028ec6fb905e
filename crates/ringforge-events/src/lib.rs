//! RingForge Events - Event bus and pub/sub substrate for the hub.
//!
//! Two distinct delivery systems live here:
//!
//! 1. **PubSub** — the process-wide broker mapping topic names to subscriber
//!    sets. Live fanout to connected sessions goes through it; publication is
//!    non-blocking and each subscriber drains its own queue.
//!
//! 2. **EventBus** — the append-only per-topic log with bounded replay.
//!    Backends are selected by configuration and share one contract:
//!    [`LocalBus`] (in-process bounded log) and [`StreamingBus`]
//!    (Kafka-shaped partitioned log with backpressure and deadlines).
//!    Callers never branch on which is active.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod broker;
mod bus;
mod error;
mod local;
mod pubsub;
mod streaming;

pub use broker::{BrokerError, InProcessBroker, StreamingBroker, TopicSpec};
pub use bus::{EventBus, ReplayOptions, SubscribeOptions};
pub use error::{BusError, BusResult};
pub use local::LocalBus;
pub use pubsub::{PubSub, SubscriberId};
pub use streaming::{RetentionPolicy, StreamingBus, StreamingConfig};
