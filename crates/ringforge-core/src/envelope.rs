//! The direct-message envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AgentId, MessageId};

/// Priority carried inside a direct message body. High and critical messages
/// get the long offline-queue TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    /// Background chatter.
    Low,
    /// Default.
    #[default]
    Normal,
    /// Important; queued for a day when the target is offline.
    High,
    /// Urgent; queued for a day when the target is offline.
    Critical,
}

impl MessagePriority {
    /// Parse a wire priority string, defaulting to `normal` on anything else.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Normal,
        }
    }

    /// Whether this priority earns the extended offline-queue TTL.
    #[must_use]
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Sender identity on a direct envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeSender {
    /// Sending agent.
    pub agent_id: AgentId,
    /// Sender display name, if any.
    pub name: Option<String>,
}

/// A direct message as delivered to the target and as persisted in the
/// offline queue. Offline expiry is computed lazily at read time from
/// `timestamp` plus the priority-keyed TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectEnvelope {
    /// Unique message identifier; receivers deduplicate on it.
    pub message_id: MessageId,
    /// Sender identity.
    pub from: EnvelopeSender,
    /// Target agent ID, or the literal `"dashboard"`.
    pub to: String,
    /// Caller correlation ID, when supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Opaque message body. May carry a `priority` field.
    pub message: Value,
    /// Send time; the offline-queue expiry anchor.
    pub timestamp: DateTime<Utc>,
}

impl DirectEnvelope {
    /// Build an envelope with a fresh message ID, stamped now.
    #[must_use]
    pub fn new(
        from: EnvelopeSender,
        to: impl Into<String>,
        message: Value,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            message_id: MessageId::generate(),
            from,
            to: to.into(),
            correlation_id,
            message,
            timestamp: Utc::now(),
        }
    }

    /// Priority read from the message body (`message.priority`).
    #[must_use]
    pub fn priority(&self) -> MessagePriority {
        self.message
            .get("priority")
            .and_then(Value::as_str)
            .map_or(MessagePriority::Normal, MessagePriority::parse)
    }

    /// Offline-queue TTL in seconds for this envelope.
    #[must_use]
    pub fn queue_ttl_seconds(&self, default_ttl: u64, elevated_ttl: u64) -> u64 {
        if self.priority().is_elevated() {
            elevated_ttl
        } else {
            default_ttl
        }
    }

    /// Whether the queued envelope is past its TTL at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, default_ttl: u64, elevated_ttl: u64) -> bool {
        let age = now.signed_duration_since(self.timestamp).num_seconds().max(0);
        age.unsigned_abs() > self.queue_ttl_seconds(default_ttl, elevated_ttl)
    }
}
