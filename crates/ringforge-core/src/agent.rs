//! Durable records: fleets, API keys, agents.
//!
//! These rows live in the relational schema layer, which is an external
//! collaborator; the hub touches them only through the directory's storage
//! traits. The shapes here mirror the table columns.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, FleetId, TenantId};

/// A fleet row: tenant-scoped grouping of agents, unique `(tenant_id, name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetRecord {
    /// Fleet identifier.
    pub fleet_id: FleetId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Fleet name, unique within the tenant.
    pub name: String,
}

/// API key type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyKind {
    /// Production key.
    Live,
    /// Test-mode key.
    Test,
    /// Administrative key.
    Admin,
}

/// An API key row. The raw key is never persisted; only its SHA-256 hash and
/// an 8-character display prefix are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// SHA-256 hash of the raw key, hex encoded.
    pub key_hash: String,
    /// First 8 characters of the raw key, for display.
    pub prefix: String,
    /// Key type.
    pub kind: ApiKeyKind,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Fleet the key registers agents into, when scoped.
    pub fleet_id: Option<FleetId>,
    /// Expiry, if any.
    pub expires_at: Option<DateTime<Utc>>,
    /// Revocation time, if revoked.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    /// Whether the key is usable at `now`: not revoked and not expired.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(expiry) => now < expiry,
            None => true,
        }
    }
}

/// A durable agent row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Opaque agent identifier (`ag_` + 12 base62).
    pub agent_id: AgentId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Fleet membership.
    pub fleet_id: FleetId,
    /// Optional squad grouping within the fleet.
    pub squad_id: Option<String>,
    /// Display name, unique within the fleet when non-empty.
    pub name: Option<String>,
    /// Framework tag (e.g. `"langchain"`, `"custom"`).
    pub framework: Option<String>,
    /// Advertised capability tags.
    pub capabilities: BTreeSet<String>,
    /// Bound Ed25519 public key, raw 32 bytes.
    pub public_key: Option<[u8; 32]>,
    /// Last time the agent connected or acted.
    pub last_seen_at: DateTime<Utc>,
    /// Lifetime connection count.
    pub total_connections: u64,
    /// Lifetime message count.
    pub total_messages: u64,
}

impl AgentRecord {
    /// Create a fresh agent row at first registration.
    #[must_use]
    pub fn new(tenant_id: TenantId, fleet_id: FleetId) -> Self {
        Self {
            agent_id: AgentId::generate(),
            tenant_id,
            fleet_id,
            squad_id: None,
            name: None,
            framework: None,
            capabilities: BTreeSet::new(),
            public_key: None,
            last_seen_at: Utc::now(),
            total_connections: 1,
            total_messages: 0,
        }
    }

    /// The non-empty display name, if one is set.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key(expires_at: Option<DateTime<Utc>>, revoked_at: Option<DateTime<Utc>>) -> ApiKeyRecord {
        ApiKeyRecord {
            key_hash: "ab".repeat(32),
            prefix: "rf_live_".into(),
            kind: ApiKeyKind::Live,
            tenant_id: TenantId::new(),
            fleet_id: None,
            expires_at,
            revoked_at,
        }
    }

    #[test]
    fn test_key_valid_when_unrevoked_and_unexpired() {
        let now = Utc::now();
        assert!(key(None, None).is_valid(now));
        assert!(key(Some(now + Duration::hours(1)), None).is_valid(now));
    }

    #[test]
    fn test_key_invalid_when_revoked() {
        let now = Utc::now();
        assert!(!key(None, Some(now)).is_valid(now));
    }

    #[test]
    fn test_key_invalid_when_expired() {
        let now = Utc::now();
        assert!(!key(Some(now - Duration::seconds(1)), None).is_valid(now));
        // Expiry exactly at `now` counts as expired.
        assert!(!key(Some(now), None).is_valid(now));
    }

    #[test]
    fn test_display_name_filters_empty() {
        let mut agent = AgentRecord::new(TenantId::new(), FleetId::new());
        assert_eq!(agent.display_name(), None);
        agent.name = Some(String::new());
        assert_eq!(agent.display_name(), None);
        agent.name = Some("a1".into());
        assert_eq!(agent.display_name(), Some("a1"));
    }
}
