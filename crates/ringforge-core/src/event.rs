//! Append-only bus event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record on a bus logical topic.
///
/// The payload always carries a `timestamp` field; for partitioned kinds it
/// also carries the partition-key field (`agent_id` for activity/direct/tasks,
/// `key` for memory). `seq` is assigned by the backend at append time and
/// breaks timestamp ties during eviction and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    /// Logical topic (`{fleet}.{kind}`).
    pub topic: String,
    /// Event kind tag inside the payload domain (e.g. an activity kind).
    pub kind: String,
    /// Partition key, when the kind is partitioned.
    pub partition_key: Option<String>,
    /// JSON payload.
    pub payload: Value,
    /// Append timestamp.
    pub timestamp: DateTime<Utc>,
    /// Backend-assigned sequence number.
    pub seq: u64,
}

impl BusEvent {
    /// Build an event stamped now, injecting `timestamp` into the payload
    /// when the caller did not set one.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        kind: impl Into<String>,
        partition_key: Option<String>,
        mut payload: Value,
    ) -> Self {
        let timestamp = Utc::now();
        if let Value::Object(map) = &mut payload {
            map.entry("timestamp")
                .or_insert_with(|| Value::String(timestamp.to_rfc3339()));
        }
        Self {
            topic: topic.into(),
            kind: kind.into(),
            partition_key,
            payload,
            timestamp,
            seq: 0,
        }
    }

    /// Payload timestamp if present and parseable, else the append timestamp.
    #[must_use]
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.payload
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or(self.timestamp, |dt| dt.with_timezone(&Utc))
    }
}
