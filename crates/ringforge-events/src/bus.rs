//! The backend-agnostic event bus contract.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ringforge_core::BusEvent;

use crate::error::BusResult;

/// Replay request bounds.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Maximum events returned; the tail of the log wins.
    pub limit: usize,
    /// When set, keep only events whose `kind` is in the set.
    pub kinds: Option<BTreeSet<String>>,
    /// When set, keep only events at or after this timestamp.
    pub from_ts: Option<DateTime<Utc>>,
}

impl ReplayOptions {
    /// Replay the last `limit` events, unfiltered.
    #[must_use]
    pub fn tail(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Whether an event passes the kind and timestamp filters.
    #[must_use]
    pub fn matches(&self, event: &BusEvent) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(from) = self.from_ts {
            if event.effective_timestamp() < from {
                return false;
            }
        }
        true
    }
}

/// Callback invoked for events appended to a subscribed topic.
pub type EventCallback = Arc<dyn Fn(&BusEvent) + Send + Sync>;

/// Subscription options.
#[derive(Clone, Default)]
pub struct SubscribeOptions {
    /// Optional callback fired per appended event. Live session fanout does
    /// not use this; it rides the pub/sub substrate instead.
    pub callback: Option<EventCallback>,
}

/// The append-only per-topic event log.
///
/// Backends must behave identically from the caller's perspective: publish
/// with bounded waiting, optional subscription, bounded tail replay.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Append an event to a logical topic.
    ///
    /// # Errors
    ///
    /// `Backpressure` past the in-flight ceiling, `Unavailable`/`Timeout`
    /// when the backend cannot take the write in time.
    async fn publish(&self, topic: &str, event: BusEvent) -> BusResult<()>;

    /// Subscribe to a topic.
    ///
    /// # Errors
    ///
    /// Backend-dependent; the local backend never fails.
    async fn subscribe(&self, topic: &str, opts: SubscribeOptions) -> BusResult<()>;

    /// Replay the topic tail under the given bounds, oldest first.
    ///
    /// # Errors
    ///
    /// `Unavailable`/`Timeout` when the backend cannot serve the read.
    async fn replay(&self, topic: &str, opts: ReplayOptions) -> BusResult<Vec<BusEvent>>;
}
