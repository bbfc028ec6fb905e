//! Presence entries: one living attachment of an agent to a fleet.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{AgentId, SessionId};

/// Liveness state advertised by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    /// Connected and accepting work.
    Online,
    /// Connected, working; eligible for routing below the load threshold.
    Busy,
    /// Connected but not accepting work.
    Away,
    /// Departing; kept only for the final diff.
    Offline,
}

impl PresenceState {
    /// Parse a wire state string. Anything outside the enum is rejected.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "busy" => Some(Self::Busy),
            "away" => Some(Self::Away),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Busy => write!(f, "busy"),
            Self::Away => write!(f, "away"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// One living attachment of an agent to a fleet. An agent connected over
/// several sockets has several entries; the registry surfaces the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// The owning socket session.
    pub session_id: SessionId,
    /// The attached agent.
    pub agent_id: AgentId,
    /// Display name at join time.
    pub name: Option<String>,
    /// Framework tag at join time.
    pub framework: Option<String>,
    /// Advertised capability tags.
    pub capabilities: BTreeSet<String>,
    /// Current liveness state.
    pub state: PresenceState,
    /// Label of the task currently being worked, if any.
    pub current_task: Option<String>,
    /// Load factor in `[0, 1]`.
    pub load: f64,
    /// Arbitrary agent-supplied metadata.
    pub metadata: Map<String, Value>,
    /// When the socket attached, ISO-8601.
    pub connected_at: DateTime<Utc>,
}

impl PresenceEntry {
    /// Create an entry for a freshly joined session, state `online`.
    #[must_use]
    pub fn joined(
        session_id: SessionId,
        agent_id: AgentId,
        name: Option<String>,
        framework: Option<String>,
        capabilities: BTreeSet<String>,
    ) -> Self {
        Self {
            session_id,
            agent_id,
            name,
            framework,
            capabilities,
            state: PresenceState::Online,
            current_task: None,
            load: 0.0,
            metadata: Map::new(),
            connected_at: Utc::now(),
        }
    }

    /// The `region` metadata tag, when the agent advertises one.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.metadata.get("region").and_then(Value::as_str)
    }
}
