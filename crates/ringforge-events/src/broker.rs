//! The broker abstraction behind the streaming backend.
//!
//! [`StreamingBus`](crate::StreamingBus) owns all Kafka-shaped semantics
//! (topic naming, partition-key hashing, backpressure, deadlines, replay
//! merging); the broker is the dumb partitioned log underneath. The
//! in-process implementation backs tests and single-node deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ringforge_core::BusEvent;
use thiserror::Error;
use tokio::sync::watch;

/// Broker-level failures.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The topic has not been created.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// The broker cannot be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Creation-time description of a topic.
#[derive(Debug, Clone)]
pub struct TopicSpec {
    /// External topic name (`ringforge.{fleet}.{kind}`).
    pub name: String,
    /// Partition count.
    pub partitions: u32,
    /// Retention policy tag (`"7d"`, `"compacted"`).
    pub retention: String,
}

/// A partitioned append-only log with offsets.
#[async_trait]
pub trait StreamingBroker: Send + Sync {
    /// Create a topic. Creating an existing topic is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Unavailable`] when the broker is down.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), BrokerError>;

    /// Partition count of a topic, when it exists.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Unavailable`] when the broker is down.
    async fn partition_count(&self, topic: &str) -> Result<Option<u32>, BrokerError>;

    /// Append an event to one partition; returns its offset.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownTopic`] for uncreated topics.
    async fn produce(
        &self,
        topic: &str,
        partition: u32,
        event: BusEvent,
    ) -> Result<u64, BrokerError>;

    /// Offset one past the newest record of a partition.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownTopic`] for uncreated topics.
    async fn latest_offset(&self, topic: &str, partition: u32) -> Result<u64, BrokerError>;

    /// Earliest offset whose record timestamp is at or after `ts`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownTopic`] for uncreated topics.
    async fn offset_for_timestamp(
        &self,
        topic: &str,
        partition: u32,
        ts: DateTime<Utc>,
    ) -> Result<u64, BrokerError>;

    /// Fetch up to `max` records from `from_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownTopic`] for uncreated topics.
    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max: usize,
    ) -> Result<Vec<BusEvent>, BrokerError>;
}

type PartitionLog = Vec<BusEvent>;

/// In-process broker: a map of `(topic, partition)` to an offset-indexed log.
///
/// `pause`/`resume` hold produce calls open, letting tests exercise the
/// streaming bus's in-flight accounting.
pub struct InProcessBroker {
    topics: DashMap<String, TopicSpec>,
    partitions: DashMap<(String, u32), PartitionLog>,
    paused: watch::Sender<bool>,
}

impl InProcessBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            topics: DashMap::new(),
            partitions: DashMap::new(),
            paused,
        }
    }

    /// Hold subsequent produce calls open until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Release paused produce calls.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    async fn wait_if_paused(&self) {
        let mut rx = self.paused.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Default for InProcessBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamingBroker for InProcessBroker {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<(), BrokerError> {
        self.topics
            .entry(spec.name.clone())
            .or_insert_with(|| spec.clone());
        Ok(())
    }

    async fn partition_count(&self, topic: &str) -> Result<Option<u32>, BrokerError> {
        Ok(self.topics.get(topic).map(|spec| spec.partitions))
    }

    async fn produce(
        &self,
        topic: &str,
        partition: u32,
        mut event: BusEvent,
    ) -> Result<u64, BrokerError> {
        if !self.topics.contains_key(topic) {
            return Err(BrokerError::UnknownTopic(topic.to_owned()));
        }
        self.wait_if_paused().await;
        let mut log = self
            .partitions
            .entry((topic.to_owned(), partition))
            .or_default();
        let offset = log.len() as u64;
        event.seq = offset;
        log.push(event);
        Ok(offset)
    }

    async fn latest_offset(&self, topic: &str, partition: u32) -> Result<u64, BrokerError> {
        if !self.topics.contains_key(topic) {
            return Err(BrokerError::UnknownTopic(topic.to_owned()));
        }
        Ok(self
            .partitions
            .get(&(topic.to_owned(), partition))
            .map_or(0, |log| log.len() as u64))
    }

    async fn offset_for_timestamp(
        &self,
        topic: &str,
        partition: u32,
        ts: DateTime<Utc>,
    ) -> Result<u64, BrokerError> {
        if !self.topics.contains_key(topic) {
            return Err(BrokerError::UnknownTopic(topic.to_owned()));
        }
        let Some(log) = self.partitions.get(&(topic.to_owned(), partition)) else {
            return Ok(0);
        };
        let idx = log
            .iter()
            .position(|e| e.timestamp >= ts)
            .unwrap_or(log.len());
        Ok(idx as u64)
    }

    async fn fetch(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max: usize,
    ) -> Result<Vec<BusEvent>, BrokerError> {
        if !self.topics.contains_key(topic) {
            return Err(BrokerError::UnknownTopic(topic.to_owned()));
        }
        let Some(log) = self.partitions.get(&(topic.to_owned(), partition)) else {
            return Ok(Vec::new());
        };
        let start = usize::try_from(from_offset).unwrap_or(usize::MAX).min(log.len());
        Ok(log.iter().skip(start).take(max).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str) -> TopicSpec {
        TopicSpec {
            name: name.to_owned(),
            partitions: 2,
            retention: "7d".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_produce_to_unknown_topic_fails() {
        let broker = InProcessBroker::new();
        let err = broker
            .produce("nope", 0, BusEvent::new("nope", "k", None, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::UnknownTopic(_)));
    }

    #[tokio::test]
    async fn test_offsets_are_per_partition() {
        let broker = InProcessBroker::new();
        broker.create_topic(&spec("t")).await.unwrap();
        let o0 = broker
            .produce("t", 0, BusEvent::new("t", "k", None, json!({})))
            .await
            .unwrap();
        let o1 = broker
            .produce("t", 1, BusEvent::new("t", "k", None, json!({})))
            .await
            .unwrap();
        let o2 = broker
            .produce("t", 0, BusEvent::new("t", "k", None, json!({})))
            .await
            .unwrap();
        assert_eq!((o0, o1, o2), (0, 0, 1));
        assert_eq!(broker.latest_offset("t", 0).await.unwrap(), 2);
        assert_eq!(broker.latest_offset("t", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_window() {
        let broker = InProcessBroker::new();
        broker.create_topic(&spec("t")).await.unwrap();
        for n in 0..5u64 {
            broker
                .produce("t", 0, BusEvent::new("t", "k", None, json!({ "n": n })))
                .await
                .unwrap();
        }
        let batch = broker.fetch("t", 0, 2, 2).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].payload["n"], 2);
    }

    #[tokio::test]
    async fn test_create_topic_idempotent() {
        let broker = InProcessBroker::new();
        broker.create_topic(&spec("t")).await.unwrap();
        let mut other = spec("t");
        other.partitions = 9;
        broker.create_topic(&other).await.unwrap();
        // First creation wins.
        assert_eq!(broker.partition_count("t").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_pause_holds_produce() {
        let broker = std::sync::Arc::new(InProcessBroker::new());
        broker.create_topic(&spec("t")).await.unwrap();
        broker.pause();

        let cloned = std::sync::Arc::clone(&broker);
        let handle = tokio::spawn(async move {
            cloned
                .produce("t", 0, BusEvent::new("t", "k", None, json!({})))
                .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        broker.resume();
        assert!(handle.await.unwrap().is_ok());
    }
}
