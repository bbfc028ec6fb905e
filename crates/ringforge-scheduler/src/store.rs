//! The ephemeral task store.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use ringforge_core::{AgentId, FleetId, HubError, HubResult, Task, TaskId, TaskStatus};
use serde_json::Value;

/// In-memory task rows plus the daily submission counter.
///
/// Every transition locks the row through the map's entry API, checks the
/// expected status, and only then writes — an `assign` on a non-pending row
/// returns `invalid_status` and is a no-op.
#[derive(Default)]
pub struct TaskStore {
    tasks: DashMap<TaskId, Task>,
    daily: DashMap<NaiveDate, u64>,
}

impl TaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created task and bump the daily counter.
    pub fn insert(&self, task: Task) {
        let date = task.created_at.date_naive();
        *self.daily.entry(date).or_insert(0) += 1;
        self.tasks.insert(task.task_id.clone(), task);
    }

    /// Fetch a task snapshot.
    #[must_use]
    pub fn get(&self, task_id: &TaskId) -> Option<Task> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Submissions recorded for a UTC date.
    #[must_use]
    pub fn daily_count(&self, date: NaiveDate) -> u64 {
        self.daily.get(&date).map_or(0, |n| *n)
    }

    /// `pending → assigned`.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] or [`HubError::InvalidStatus`].
    pub fn assign(&self, task_id: &TaskId, agent_id: &AgentId) -> HubResult<Task> {
        self.transition(task_id, &[TaskStatus::Pending], |task| {
            task.status = TaskStatus::Assigned;
            task.assigned_to = Some(agent_id.clone());
            task.assigned_at = Some(Utc::now());
        })
    }

    /// `assigned → running`.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] or [`HubError::InvalidStatus`].
    pub fn start(&self, task_id: &TaskId) -> HubResult<Task> {
        self.transition(task_id, &[TaskStatus::Assigned], |task| {
            task.status = TaskStatus::Running;
        })
    }

    /// `assigned|running → completed`.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] or [`HubError::InvalidStatus`].
    pub fn complete(&self, task_id: &TaskId, result: Value) -> HubResult<Task> {
        self.transition(
            task_id,
            &[TaskStatus::Assigned, TaskStatus::Running],
            |task| {
                task.status = TaskStatus::Completed;
                task.result = Some(result.clone());
                task.completed_at = Some(Utc::now());
            },
        )
    }

    /// `assigned|running → failed`.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] or [`HubError::InvalidStatus`].
    pub fn fail(&self, task_id: &TaskId, error: String) -> HubResult<Task> {
        self.transition(
            task_id,
            &[TaskStatus::Assigned, TaskStatus::Running],
            |task| {
                task.status = TaskStatus::Failed;
                task.error = Some(error.clone());
                task.completed_at = Some(Utc::now());
            },
        )
    }

    /// Any non-terminal status to `timeout`.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] or [`HubError::InvalidStatus`].
    pub fn timeout(&self, task_id: &TaskId) -> HubResult<Task> {
        self.transition(
            task_id,
            &[TaskStatus::Pending, TaskStatus::Assigned, TaskStatus::Running],
            |task| {
                task.status = TaskStatus::Timeout;
                task.error = Some("timeout".to_owned());
                task.completed_at = Some(Utc::now());
            },
        )
    }

    /// Pending tasks grouped by fleet; the ticker's routing input.
    #[must_use]
    pub fn pending_by_fleet(&self) -> HashMap<FleetId, Vec<Task>> {
        let mut grouped: HashMap<FleetId, Vec<Task>> = HashMap::new();
        for entry in self.tasks.iter() {
            if entry.status == TaskStatus::Pending {
                grouped.entry(entry.fleet_id).or_default().push(entry.clone());
            }
        }
        grouped
    }

    /// Non-terminal tasks past their TTL at `now`.
    #[must_use]
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| !t.status.is_terminal() && t.is_expired(now))
            .map(|t| t.clone())
            .collect()
    }

    /// Drop terminal rows whose `completed_at` is older than the cutoff, and
    /// any non-terminal rows past TTL the timeout pass missed. Returns how
    /// many rows were removed.
    pub fn purge(&self, now: DateTime<Utc>, cutoff_ms: u64) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| {
            if task.status.is_terminal() {
                let age_ms = task
                    .completed_at
                    .map_or(0, |done| now.signed_duration_since(done).num_milliseconds())
                    .max(0);
                return age_ms.unsigned_abs() <= cutoff_ms;
            }
            !task.is_expired(now)
        });
        before.saturating_sub(self.tasks.len())
    }

    fn transition(
        &self,
        task_id: &TaskId,
        expected: &[TaskStatus],
        mutate: impl FnOnce(&mut Task),
    ) -> HubResult<Task> {
        let mut row = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| HubError::NotFound(format!("task {task_id}")))?;
        if !expected.contains(&row.status) {
            return Err(HubError::InvalidStatus(format!(
                "{} cannot leave {}",
                task_id, row.status
            )));
        }
        mutate(&mut row);
        Ok(row.clone())
    }
}
