//! Activity kinds and delivery scopes.

use ringforge_core::{HubError, HubResult};
use serde_json::Value;

/// The closed set of activity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// A task began.
    TaskStarted,
    /// Progress on a running task.
    TaskProgress,
    /// A task finished successfully.
    TaskCompleted,
    /// A task failed or timed out.
    TaskFailed,
    /// An agent found something worth sharing.
    Discovery,
    /// An agent is asking the fleet.
    Question,
    /// Something needs attention.
    Alert,
    /// Application-defined.
    Custom,
}

impl ActivityKind {
    /// Parse a wire kind. Anything outside the set is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidKind`] for unknown kinds.
    pub fn parse(s: &str) -> HubResult<Self> {
        match s {
            "task_started" => Ok(Self::TaskStarted),
            "task_progress" => Ok(Self::TaskProgress),
            "task_completed" => Ok(Self::TaskCompleted),
            "task_failed" => Ok(Self::TaskFailed),
            "discovery" => Ok(Self::Discovery),
            "question" => Ok(Self::Question),
            "alert" => Ok(Self::Alert),
            "custom" => Ok(Self::Custom),
            other => Err(HubError::InvalidKind(other.to_owned())),
        }
    }

    /// The wire tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskStarted => "task_started",
            Self::TaskProgress => "task_progress",
            Self::TaskCompleted => "task_completed",
            Self::TaskFailed => "task_failed",
            Self::Discovery => "discovery",
            Self::Question => "question",
            Self::Alert => "alert",
            Self::Custom => "custom",
        }
    }
}

/// Delivery scope of an activity broadcast, chosen by the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityScope {
    /// Every session on the fleet topic.
    Fleet,
    /// Sessions subscribed to at least one of the listed tags.
    Tagged(Vec<String>),
    /// One target agent.
    Direct(String),
}

impl ActivityScope {
    /// Read the scope out of an `activity:broadcast` payload. Defaults to
    /// `fleet` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidPayload`] for unknown scopes or a `direct`
    /// scope without a target.
    pub fn from_payload(payload: &Value) -> HubResult<Self> {
        match payload.get("scope").and_then(Value::as_str) {
            None | Some("fleet") => Ok(Self::Fleet),
            Some("tagged") => {
                let tags = payload
                    .get("tags")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .filter_map(Value::as_str)
                            .map(ToOwned::to_owned)
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                Ok(Self::Tagged(tags))
            }
            Some("direct") => payload
                .get("to")
                .and_then(Value::as_str)
                .map(|to| Self::Direct(to.to_owned()))
                .ok_or_else(|| HubError::InvalidPayload("direct scope requires to".to_owned())),
            Some(other) => Err(HubError::InvalidPayload(format!("unknown scope {other}"))),
        }
    }
}
