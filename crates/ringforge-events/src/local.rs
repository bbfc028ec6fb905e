//! The in-process event bus backend.
//!
//! A per-topic bounded append log. Live delivery rides the pub/sub substrate,
//! so `subscribe` only records an optional callback; the log exists for
//! replay.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use ringforge_core::BusEvent;
use tracing::trace;

use crate::bus::{EventBus, EventCallback, ReplayOptions, SubscribeOptions};
use crate::error::BusResult;

/// Default per-topic entry cap.
pub const DEFAULT_MAX_EVENTS_PER_TOPIC: usize = 10_000;

/// In-process bounded per-topic log.
pub struct LocalBus {
    topics: DashMap<String, VecDeque<BusEvent>>,
    callbacks: DashMap<String, Vec<EventCallback>>,
    max_per_topic: usize,
    seq: AtomicU64,
}

impl LocalBus {
    /// Create a bus with the default per-topic cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS_PER_TOPIC)
    }

    /// Create a bus with a specific per-topic cap.
    #[must_use]
    pub fn with_capacity(max_per_topic: usize) -> Self {
        Self {
            topics: DashMap::new(),
            callbacks: DashMap::new(),
            max_per_topic: max_per_topic.max(1),
            seq: AtomicU64::new(0),
        }
    }

    /// Number of entries currently held for a topic.
    #[must_use]
    pub fn topic_len(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |log| log.len())
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for LocalBus {
    async fn publish(&self, topic: &str, mut event: BusEvent) -> BusResult<()> {
        event.seq = self.seq.fetch_add(1, Ordering::Relaxed);
        event.topic = topic.to_owned();

        if let Some(callbacks) = self.callbacks.get(topic) {
            for callback in callbacks.iter() {
                callback(&event);
            }
        }

        let mut log = self.topics.entry(topic.to_owned()).or_default();
        // Appends are in insertion-timestamp order, so the front is the
        // oldest by (ts, seq).
        while log.len() >= self.max_per_topic {
            log.pop_front();
        }
        log.push_back(event);
        trace!(topic, len = log.len(), "event appended");
        Ok(())
    }

    async fn subscribe(&self, topic: &str, opts: SubscribeOptions) -> BusResult<()> {
        if let Some(callback) = opts.callback {
            self.callbacks.entry(topic.to_owned()).or_default().push(callback);
        }
        Ok(())
    }

    async fn replay(&self, topic: &str, opts: ReplayOptions) -> BusResult<Vec<BusEvent>> {
        let Some(log) = self.topics.get(topic) else {
            return Ok(Vec::new());
        };
        let matched: Vec<BusEvent> = log.iter().filter(|e| opts.matches(e)).cloned().collect();
        let skip = matched.len().saturating_sub(opts.limit);
        Ok(matched.into_iter().skip(skip).collect())
    }
}
