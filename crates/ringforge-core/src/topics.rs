//! Topic naming for the pub/sub substrate and the event bus.
//!
//! Pub/sub topics are process-local delivery channels (`fleet:{id}`,
//! `fleet:{id}:agent:{a}`, ...). Bus logical topics are `{fleet}.{kind}`
//! append-only logs; the streaming backend maps them to
//! `ringforge.{fleet}.{kind}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, FleetId};

/// The hub-wide event firehose topic.
pub const HUB_EVENTS: &str = "hub:events";

/// Event kind segment of a bus logical topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Fleet activity broadcasts.
    Activity,
    /// Shared-memory changes, partitioned by memory key.
    Memory,
    /// Direct-message history.
    Direct,
    /// Task lifecycle events.
    Tasks,
    /// Operational telemetry (auth outcomes, counters).
    Telemetry,
    /// Security audit trail.
    Audit,
}

impl EventKind {
    /// The topic segment for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Memory => "memory",
            Self::Direct => "direct",
            Self::Tasks => "tasks",
            Self::Telemetry => "telemetry",
            Self::Audit => "audit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pub/sub topic for a whole fleet.
#[must_use]
pub fn fleet(fleet_id: &FleetId) -> String {
    format!("fleet:{fleet_id}")
}

/// Pub/sub topic for one tag within a fleet.
#[must_use]
pub fn fleet_tag(fleet_id: &FleetId, tag: &str) -> String {
    format!("fleet:{fleet_id}:tag:{tag}")
}

/// Pub/sub topic for one agent's direct deliveries within a fleet. The agent
/// segment is a raw string so the literal `"dashboard"` target works too.
#[must_use]
pub fn fleet_agent(fleet_id: &FleetId, agent: &str) -> String {
    format!("fleet:{fleet_id}:agent:{agent}")
}

/// Pub/sub topic for one shared-memory key.
#[must_use]
pub fn memory_key(fleet_id: &FleetId, key: &str) -> String {
    format!("memory:{fleet_id}:{key}")
}

/// Pub/sub topic observing every shared-memory change in a fleet.
#[must_use]
pub fn memory_all(fleet_id: &FleetId) -> String {
    format!("memory:{fleet_id}:_all")
}

/// Pub/sub topic for one hub event type.
#[must_use]
pub fn hub_events_typed(event_type: &str) -> String {
    format!("{HUB_EVENTS}:{event_type}")
}

/// Bus logical topic `{fleet}.{kind}`. The fleet segment is a fleet UUID, or
/// `"system"` for events with no fleet scope.
#[must_use]
pub fn bus_topic(fleet_segment: &str, kind: EventKind) -> String {
    format!("{fleet_segment}.{kind}")
}

/// Offline direct-message queue key for the document store.
#[must_use]
pub fn dm_queue_key(fleet_id: &FleetId, to: &str, message_id: &str) -> String {
    format!("dmq:{fleet_id}:{to}:{message_id}")
}

/// Offline direct-message queue key prefix for one agent, for listing.
#[must_use]
pub fn dm_queue_prefix(fleet_id: &FleetId, to: &str) -> String {
    format!("dmq:{fleet_id}:{to}:")
}

/// Shared-memory document key.
#[must_use]
pub fn memory_doc_key(fleet_id: &FleetId, key: &str) -> String {
    format!("mem:{fleet_id}:{key}")
}
