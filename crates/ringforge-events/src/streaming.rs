//! The Kafka-shaped streaming backend.
//!
//! Maps logical topics `{fleet}.{kind}` to external topics
//! `ringforge.{fleet}.{kind}`, places events on partitions by partition-key
//! hash, refuses publishes past the in-flight ceiling, auto-creates topics on
//! first publish, and bounds every broker call with a deadline. Replay
//! fetches all partitions in parallel, merges, sorts by timestamp, and
//! truncates to the requested tail.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use ringforge_core::BusEvent;
use tracing::{debug, warn};

use crate::broker::{BrokerError, StreamingBroker, TopicSpec};
use crate::bus::{EventBus, EventCallback, ReplayOptions, SubscribeOptions};
use crate::error::{BusError, BusResult};

/// Retention policy for a topic kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Time-bounded retention in days.
    Days(u32),
    /// Log compaction by key.
    Compacted,
}

impl RetentionPolicy {
    fn tag(self) -> String {
        match self {
            Self::Days(d) => format!("{d}d"),
            Self::Compacted => "compacted".to_owned(),
        }
    }
}

/// Per-kind partition count and retention.
fn kind_layout(kind: &str) -> (u32, RetentionPolicy) {
    match kind {
        "activity" | "tasks" => (6, RetentionPolicy::Days(7)),
        "memory" => (3, RetentionPolicy::Compacted),
        _ => (3, RetentionPolicy::Days(7)),
    }
}

/// Streaming backend configuration.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Client identifier presented to the brokers.
    pub client_id: String,
    /// Broker addresses.
    pub brokers: Vec<String>,
    /// In-flight publish ceiling before `backpressure`.
    pub max_in_flight: usize,
    /// Publish deadline.
    pub publish_timeout: Duration,
    /// Replay deadline.
    pub replay_timeout: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            client_id: "ringforge-hub".to_owned(),
            brokers: Vec::new(),
            max_in_flight: 5000,
            publish_timeout: Duration::from_secs(10),
            replay_timeout: Duration::from_secs(15),
        }
    }
}

/// The streaming event bus.
pub struct StreamingBus {
    broker: Arc<dyn StreamingBroker>,
    config: StreamingConfig,
    callbacks: dashmap::DashMap<String, Vec<EventCallback>>,
    in_flight: AtomicUsize,
    round_robin: AtomicU64,
}

impl StreamingBus {
    /// Create a streaming bus over a broker.
    #[must_use]
    pub fn new(broker: Arc<dyn StreamingBroker>, config: StreamingConfig) -> Self {
        Self {
            broker,
            config,
            callbacks: dashmap::DashMap::new(),
            in_flight: AtomicUsize::new(0),
            round_robin: AtomicU64::new(0),
        }
    }

    /// External topic name for a logical topic.
    #[must_use]
    pub fn external_topic(logical: &str) -> String {
        format!("ringforge.{logical}")
    }

    fn kind_of(logical: &str) -> &str {
        logical.rsplit('.').next().unwrap_or(logical)
    }

    fn topic_spec(logical: &str) -> TopicSpec {
        let (partitions, retention) = kind_layout(Self::kind_of(logical));
        TopicSpec {
            name: Self::external_topic(logical),
            partitions,
            retention: retention.tag(),
        }
    }

    fn pick_partition(&self, partitions: u32, key: Option<&str>) -> u32 {
        match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % u64::from(partitions.max(1))) as u32
            }
            None => {
                let n = self.round_robin.fetch_add(1, Ordering::Relaxed);
                (n % u64::from(partitions.max(1))) as u32
            }
        }
    }

    async fn produce_with_create(
        &self,
        logical: &str,
        event: BusEvent,
    ) -> Result<u64, BrokerError> {
        let spec = Self::topic_spec(logical);
        let external = &spec.name;
        let partitions = match self.broker.partition_count(external).await? {
            Some(n) => n,
            None => {
                // Unknown topic: create once and retry, then give up.
                debug!(topic = %external, "auto-creating topic");
                self.broker.create_topic(&spec).await?;
                self.broker
                    .partition_count(external)
                    .await?
                    .ok_or_else(|| BrokerError::UnknownTopic(external.clone()))?
            }
        };
        let partition = self.pick_partition(partitions, event.partition_key.as_deref());
        match self.broker.produce(external, partition, event.clone()).await {
            Ok(offset) => Ok(offset),
            Err(BrokerError::UnknownTopic(_)) => {
                self.broker.create_topic(&spec).await?;
                self.broker.produce(external, partition, event).await
            }
            Err(e) => Err(e),
        }
    }

    async fn replay_partitions(
        &self,
        logical: &str,
        opts: &ReplayOptions,
    ) -> Result<Vec<BusEvent>, BrokerError> {
        let external = Self::external_topic(logical);
        let Some(partitions) = self.broker.partition_count(&external).await? else {
            return Ok(Vec::new());
        };

        let fetches = (0..partitions).map(|partition| {
            let external = external.clone();
            let broker = Arc::clone(&self.broker);
            let from_ts = opts.from_ts;
            let limit = opts.limit;
            async move {
                let from = match from_ts {
                    Some(ts) => {
                        broker
                            .offset_for_timestamp(&external, partition, ts)
                            .await?
                    }
                    None => {
                        let latest = broker.latest_offset(&external, partition).await?;
                        latest.saturating_sub(limit as u64)
                    }
                };
                broker.fetch(&external, partition, from, limit).await
            }
        });

        let mut merged = Vec::new();
        for result in join_all(fetches).await {
            merged.extend(result?);
        }
        merged.sort_by(|a, b| {
            a.effective_timestamp()
                .cmp(&b.effective_timestamp())
                .then(a.seq.cmp(&b.seq))
        });
        let filtered: Vec<BusEvent> = merged.into_iter().filter(|e| opts.matches(e)).collect();
        let skip = filtered.len().saturating_sub(opts.limit);
        Ok(filtered.into_iter().skip(skip).collect())
    }
}

/// Decrements the in-flight counter when a publish finishes, including on
/// timeout (the future is dropped, the guard is not).
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventBus for StreamingBus {
    async fn publish(&self, topic: &str, event: BusEvent) -> BusResult<()> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);
        if in_flight >= self.config.max_in_flight {
            warn!(topic, in_flight, "publish refused: backpressure");
            return Err(BusError::Backpressure {
                in_flight: in_flight.saturating_add(1),
            });
        }

        let produced = tokio::time::timeout(
            self.config.publish_timeout,
            self.produce_with_create(topic, event.clone()),
        )
        .await
        .map_err(|_| BusError::Timeout("publish".to_owned()))?;

        match produced {
            Ok(_) => {
                if let Some(callbacks) = self.callbacks.get(topic) {
                    for callback in callbacks.iter() {
                        callback(&event);
                    }
                }
                Ok(())
            }
            Err(BrokerError::UnknownTopic(t)) => Err(BusError::UnknownTopic(t)),
            Err(BrokerError::Unavailable(msg)) => Err(BusError::Unavailable(msg)),
        }
    }

    async fn subscribe(&self, topic: &str, opts: SubscribeOptions) -> BusResult<()> {
        if let Some(callback) = opts.callback {
            self.callbacks.entry(topic.to_owned()).or_default().push(callback);
        }
        Ok(())
    }

    async fn replay(&self, topic: &str, opts: ReplayOptions) -> BusResult<Vec<BusEvent>> {
        let result = tokio::time::timeout(
            self.config.replay_timeout,
            self.replay_partitions(topic, &opts),
        )
        .await
        .map_err(|_| BusError::Timeout("replay".to_owned()))?;

        match result {
            Ok(events) => Ok(events),
            Err(BrokerError::UnknownTopic(t)) => Err(BusError::UnknownTopic(t)),
            Err(BrokerError::Unavailable(msg)) => Err(BusError::Unavailable(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InProcessBroker;
    use serde_json::json;

    fn bus_with(max_in_flight: usize) -> (Arc<InProcessBroker>, StreamingBus) {
        let broker = Arc::new(InProcessBroker::new());
        let bus = StreamingBus::new(
            Arc::clone(&broker) as Arc<dyn StreamingBroker>,
            StreamingConfig {
                max_in_flight,
                publish_timeout: Duration::from_millis(500),
                replay_timeout: Duration::from_millis(500),
                ..StreamingConfig::default()
            },
        );
        (broker, bus)
    }

    fn event(key: Option<&str>, n: u64) -> BusEvent {
        BusEvent::new(
            "f1.activity",
            "discovery",
            key.map(ToOwned::to_owned),
            json!({ "n": n }),
        )
    }

    #[tokio::test]
    async fn test_auto_creates_topic_on_first_publish() {
        let (broker, bus) = bus_with(100);
        bus.publish("f1.activity", event(Some("ag_a"), 0)).await.unwrap();
        assert_eq!(
            broker
                .partition_count("ringforge.f1.activity")
                .await
                .unwrap(),
            Some(6)
        );
    }

    #[tokio::test]
    async fn test_partition_key_keeps_order() {
        let (_broker, bus) = bus_with(100);
        for n in 0..20 {
            bus.publish("f1.activity", event(Some("ag_a"), n)).await.unwrap();
        }
        let events = bus
            .replay("f1.activity", ReplayOptions::tail(20))
            .await
            .unwrap();
        assert_eq!(events.len(), 20);
        // All events share the partition, so replay preserves insertion order.
        let ns: Vec<u64> = events
            .iter()
            .map(|e| e.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(ns, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_round_robin_without_key() {
        let (broker, bus) = bus_with(100);
        for n in 0..6 {
            bus.publish("f1.telemetry", event(None, n)).await.unwrap();
        }
        // Telemetry has 3 partitions; round-robin spreads evenly.
        let mut total = 0;
        for p in 0..3 {
            total += broker
                .latest_offset("ringforge.f1.telemetry", p)
                .await
                .unwrap();
        }
        assert_eq!(total, 6);
        assert_eq!(
            broker.latest_offset("ringforge.f1.telemetry", 0).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_backpressure_at_ceiling() {
        let (broker, bus) = bus_with(2);
        let bus = Arc::new(bus);
        // Prime the topic so held publishes are past creation.
        bus.publish("f1.activity", event(Some("k"), 0)).await.unwrap();

        broker.pause();
        let h1 = tokio::spawn({
            let bus = Arc::clone(&bus);
            async move { bus.publish("f1.activity", event(Some("k"), 1)).await }
        });
        let h2 = tokio::spawn({
            let bus = Arc::clone(&bus);
            async move { bus.publish("f1.activity", event(Some("k"), 2)).await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let refused = bus.publish("f1.activity", event(Some("k"), 3)).await;
        assert!(matches!(refused, Err(BusError::Backpressure { .. })));

        broker.resume();
        assert!(h1.await.unwrap().is_ok());
        assert!(h2.await.unwrap().is_ok());
        // Backlog drained; publishes flow again.
        assert!(bus.publish("f1.activity", event(Some("k"), 4)).await.is_ok());
    }

    #[tokio::test]
    async fn test_publish_timeout_releases_in_flight() {
        let (broker, bus) = bus_with(10);
        bus.publish("f1.activity", event(Some("k"), 0)).await.unwrap();

        broker.pause();
        let refused = bus.publish("f1.activity", event(Some("k"), 1)).await;
        assert!(matches!(refused, Err(BusError::Timeout(_))));
        broker.resume();

        // The timed-out publish released its slot.
        assert!(bus.publish("f1.activity", event(Some("k"), 2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_replay_merges_partitions_sorted() {
        let (_broker, bus) = bus_with(100);
        // Distinct keys land on different partitions.
        for n in 0..10 {
            let key = if n % 2 == 0 { "ag_a" } else { "ag_b" };
            bus.publish("f1.activity", event(Some(key), n)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        let events = bus
            .replay("f1.activity", ReplayOptions::tail(10))
            .await
            .unwrap();
        assert_eq!(events.len(), 10);
        assert!(
            events
                .windows(2)
                .all(|w| w[0].effective_timestamp() <= w[1].effective_timestamp())
        );
    }

    #[tokio::test]
    async fn test_replay_unknown_topic_empty() {
        let (_broker, bus) = bus_with(100);
        let events = bus.replay("ghost.activity", ReplayOptions::tail(5)).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_memory_kind_is_compacted_layout() {
        let spec = StreamingBus::topic_spec("f1.memory");
        assert_eq!(spec.partitions, 3);
        assert_eq!(spec.retention, "compacted");
        let spec = StreamingBus::topic_spec("f1.tasks");
        assert_eq!(spec.partitions, 6);
        assert_eq!(spec.retention, "7d");
    }
}
