//! Audit entry types and actions.

use chrono::{DateTime, Utc};
use ringforge_core::{AgentId, FleetId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// An agent registered for the first time.
    AgentRegistered,
    /// An agent reconnected (key or name collision path).
    AgentReconnected,
    /// A connection attempt failed authentication.
    AuthFailed,
    /// A challenge was issued.
    ChallengeIssued,
    /// A challenge reconnect verified successfully.
    ChallengeVerified,
    /// An agent's bound public key changed.
    KeyRotated,
    /// A session closed.
    SessionClosed,
}

impl AuditAction {
    /// The wire tag for this action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AgentRegistered => "agent_registered",
            Self::AgentReconnected => "agent_reconnected",
            Self::AuthFailed => "auth_failed",
            Self::ChallengeIssued => "challenge_issued",
            Self::ChallengeVerified => "challenge_verified",
            Self::KeyRotated => "key_rotated",
            Self::SessionClosed => "session_closed",
        }
    }
}

/// Outcome of the audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum AuditOutcome {
    /// The action succeeded.
    Success,
    /// The action failed.
    Failure {
        /// Tagged reason.
        reason: String,
    },
}

/// One row of the `audit_logs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// Fleet scope; `None` for pre-auth and system actions.
    pub fleet_id: Option<FleetId>,
    /// Acting agent, when known.
    pub agent_id: Option<AgentId>,
    /// The action.
    pub action: AuditAction,
    /// Outcome.
    pub outcome: AuditOutcome,
    /// Free-form detail (auth method, peer address, key prefix).
    pub detail: Value,
}

impl AuditEntry {
    /// Build an entry stamped now.
    #[must_use]
    pub fn new(
        fleet_id: Option<FleetId>,
        agent_id: Option<AgentId>,
        action: AuditAction,
        outcome: AuditOutcome,
        detail: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            fleet_id,
            agent_id,
            action,
            outcome,
            detail,
        }
    }

    /// The bus topic segment for this entry's fleet scope.
    #[must_use]
    pub fn fleet_segment(&self) -> String {
        self.fleet_id
            .map_or_else(|| "system".to_owned(), |f| f.to_string())
    }
}
