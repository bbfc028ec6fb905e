//! The process-wide pub/sub broker.
//!
//! Topics are plain strings (`fleet:{id}`, `fleet:{id}:agent:{a}`, ...).
//! Each subscriber registers once and owns a single unbounded queue; topic
//! subscriptions attach that queue to topic fanout sets. Publication never
//! blocks: closed subscribers are pruned from the topic set as they are
//! discovered.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use ringforge_core::ServerFrame;
use tokio::sync::mpsc;
use tracing::trace;

/// Identifies one registered subscriber queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// The process-wide topic broker.
#[derive(Default)]
pub struct PubSub {
    senders: DashMap<SubscriberId, mpsc::UnboundedSender<Arc<ServerFrame>>>,
    topics: DashMap<String, HashSet<SubscriberId>>,
    next_id: AtomicU64,
}

impl PubSub {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber queue. The receiver is the subscriber's private
    /// work queue; every topic it subscribes to feeds it.
    #[must_use]
    pub fn register(&self) -> (SubscriberId, mpsc::UnboundedReceiver<Arc<ServerFrame>>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(id, tx);
        (id, rx)
    }

    /// Attach a registered subscriber to a topic.
    pub fn subscribe(&self, topic: &str, id: SubscriberId) {
        self.topics.entry(topic.to_owned()).or_default().insert(id);
        trace!(topic, subscriber = id.0, "subscribed");
    }

    /// Detach a subscriber from a topic.
    pub fn unsubscribe(&self, topic: &str, id: SubscriberId) {
        if let Some(mut set) = self.topics.get_mut(topic) {
            set.remove(&id);
        }
    }

    /// Drop a subscriber queue entirely. Topic sets are pruned lazily on the
    /// next publish to each topic.
    pub fn deregister(&self, id: SubscriberId) {
        self.senders.remove(&id);
    }

    /// Publish a frame to every subscriber of a topic. Returns the number of
    /// queues that accepted the frame.
    pub fn publish(&self, topic: &str, frame: Arc<ServerFrame>) -> usize {
        let Some(mut set) = self.topics.get_mut(topic) else {
            trace!(topic, "no subscribers");
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for id in set.iter() {
            match self.senders.get(id) {
                Some(tx) if tx.send(Arc::clone(&frame)).is_ok() => delivered += 1,
                _ => dead.push(*id),
            }
        }
        for id in dead {
            set.remove(&id);
        }
        delivered
    }

    /// Number of live subscribers attached to a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |set| set.len())
    }
}
