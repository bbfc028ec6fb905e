//! Identifier newtypes used throughout the hub.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a tenant (isolation boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    /// Create a new random tenant ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a tenant ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a fleet (tenant-scoped grouping of agents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FleetId(pub Uuid);

impl FleetId {
    /// Create a new random fleet ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a fleet ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for FleetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FleetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one socket attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Durable, opaque agent identifier: `ag_` followed by 12 base62 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    const PREFIX: &'static str = "ag_";
    const SUFFIX_LEN: usize = 12;

    /// Generate a fresh random agent ID.
    #[must_use]
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self(format!("{}{suffix}", Self::PREFIX))
    }

    /// Parse an agent ID, validating the `ag_` + 12 base62 shape.
    ///
    /// # Errors
    ///
    /// Returns the rejected input if the shape does not match.
    pub fn parse(s: &str) -> Result<Self, String> {
        let suffix = s.strip_prefix(Self::PREFIX).ok_or_else(|| s.to_owned())?;
        if suffix.len() == Self::SUFFIX_LEN && suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(s.to_owned())
        }
    }

    /// View as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ephemeral task identifier: `task_` followed by 16 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random task ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("task_{}", random_hex(16)))
    }

    /// View as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direct-message identifier: `msg_` followed by 16 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh random message ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("msg_{}", random_hex(16)))
    }

    /// View as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn random_hex(chars: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..chars)
        .map(|_| {
            let n: u8 = rng.gen_range(0..16);
            char::from_digit(u32::from(n), 16).unwrap_or('0')
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_shape() {
        let id = AgentId::generate();
        let s = id.as_str();
        assert!(s.starts_with("ag_"));
        assert_eq!(s.len(), 15);
        assert!(s[3..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_agent_id_parse_roundtrip() {
        let id = AgentId::generate();
        let parsed = AgentId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_agent_id_parse_rejects_bad_shapes() {
        assert!(AgentId::parse("ag_short").is_err());
        assert!(AgentId::parse("agent_123456789012").is_err());
        assert!(AgentId::parse("ag_12345678901!").is_err());
        assert!(AgentId::parse("").is_err());
    }

    #[test]
    fn test_task_id_shape() {
        let id = TaskId::generate();
        let s = id.as_str();
        assert!(s.starts_with("task_"));
        assert_eq!(s.len(), 21);
        assert!(s[5..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_message_id_shape() {
        let id = MessageId::generate();
        let s = id.as_str();
        assert!(s.starts_with("msg_"));
        assert_eq!(s.len(), 20);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(AgentId::generate(), AgentId::generate());
        assert_ne!(TaskId::generate(), TaskId::generate());
        assert_ne!(TenantId::new(), TenantId::new());
    }

    #[test]
    fn test_agent_id_serde_transparent() {
        let id = AgentId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_str()));
    }
}
