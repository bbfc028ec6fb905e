//! Ephemeral task rows and their status machine.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AgentId, FleetId, TaskId};

/// Default task TTL when the submitter does not supply one.
pub const DEFAULT_TASK_TTL_MS: u64 = 30_000;

/// Upper bound on task TTL; larger requests are clamped.
pub const MAX_TASK_TTL_MS: u64 = 300_000;

/// Task lifecycle status.
///
/// Transitions: `pending → assigned → running → (completed | failed)`;
/// any active status may move to `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a capable agent.
    Pending,
    /// Routed to an agent, not yet started.
    Assigned,
    /// The assignee reported progress.
    Running,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
    /// Exceeded its TTL before completing.
    Timeout,
}

impl TaskStatus {
    /// Whether the status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }

    /// Whether the status is active (assigned or running).
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Assigned | Self::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Assigned => write!(f, "assigned"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default.
    #[default]
    Normal,
    /// Front of the queue.
    High,
}

/// An ephemeral unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier (`task_` + 16 hex).
    pub task_id: TaskId,
    /// Fleet the task was submitted in.
    pub fleet_id: FleetId,
    /// Submitting agent.
    pub requester_id: AgentId,
    /// Free-form task type tag.
    pub task_type: String,
    /// The work description handed to the assignee.
    pub prompt: String,
    /// Capability tags a candidate must cover. Empty matches all.
    pub capabilities_required: BTreeSet<String>,
    /// Current assignee, when routed.
    pub assigned_to: Option<AgentId>,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Result payload on completion.
    pub result: Option<Value>,
    /// Error string on failure.
    pub error: Option<String>,
    /// Priority.
    pub priority: TaskPriority,
    /// Time budget in milliseconds, clamped to `[1, MAX_TASK_TTL_MS]`.
    pub ttl_ms: u64,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Assignment time.
    pub assigned_at: Option<DateTime<Utc>>,
    /// Terminal time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Caller correlation ID, echoed in result pushes.
    pub correlation_id: Option<String>,
}

impl Task {
    /// Create a pending task, clamping the TTL into the allowed range.
    #[must_use]
    pub fn new(
        fleet_id: FleetId,
        requester_id: AgentId,
        task_type: impl Into<String>,
        prompt: impl Into<String>,
        capabilities_required: BTreeSet<String>,
        priority: TaskPriority,
        ttl_ms: Option<u64>,
        correlation_id: Option<String>,
    ) -> Self {
        let ttl_ms = ttl_ms.unwrap_or(DEFAULT_TASK_TTL_MS).clamp(1, MAX_TASK_TTL_MS);
        Self {
            task_id: TaskId::generate(),
            fleet_id,
            requester_id,
            task_type: task_type.into(),
            prompt: prompt.into(),
            capabilities_required,
            assigned_to: None,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            priority,
            ttl_ms,
            created_at: Utc::now(),
            assigned_at: None,
            completed_at: None,
            correlation_id,
        }
    }

    /// Whether the task has outlived its TTL at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age_ms = now
            .signed_duration_since(self.created_at)
            .num_milliseconds()
            .max(0);
        age_ms.unsigned_abs() > self.ttl_ms
    }
}
