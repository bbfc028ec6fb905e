//! The task scheduler and its ticker.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ringforge_core::{
    topics, AgentId, BusEvent, EventKind, FleetId, HubError, HubResult, ServerFrame, Task,
    TaskId, TaskPriority, TaskStatus,
};
use ringforge_events::{EventBus, PubSub};
use ringforge_presence::PresenceRegistry;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::routing::route_task;
use crate::store::TaskStore;

/// Scheduler tunables.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Ticker interval.
    pub tick_interval: Duration,
    /// Default task TTL in milliseconds.
    pub default_ttl_ms: u64,
    /// Maximum task TTL in milliseconds; larger submissions are clamped.
    pub max_ttl_ms: u64,
    /// Age past terminal at which rows are purged, in milliseconds.
    pub cleanup_cutoff_ms: u64,
    /// Region of this hub instance; `"local"` disables affinity.
    pub local_region: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            default_ttl_ms: 30_000,
            max_ttl_ms: 300_000,
            cleanup_cutoff_ms: 300_000,
            local_region: "local".to_owned(),
        }
    }
}

/// A `task:submit` payload, already validated by the gateway.
#[derive(Debug, Clone)]
pub struct TaskSubmission {
    /// Free-form task type tag.
    pub task_type: String,
    /// Work description.
    pub prompt: String,
    /// Capability tags a candidate must cover.
    pub capabilities_required: BTreeSet<String>,
    /// Priority.
    pub priority: TaskPriority,
    /// Requested TTL in milliseconds.
    pub ttl_ms: Option<u64>,
    /// Caller correlation ID.
    pub correlation_id: Option<String>,
}

/// Schedules tasks across a fleet's roster.
pub struct TaskScheduler {
    store: TaskStore,
    presence: Arc<PresenceRegistry>,
    pubsub: Arc<PubSub>,
    bus: Arc<dyn EventBus>,
    config: SchedulerConfig,
}

impl TaskScheduler {
    /// Wire up the scheduler.
    #[must_use]
    pub fn new(
        presence: Arc<PresenceRegistry>,
        pubsub: Arc<PubSub>,
        bus: Arc<dyn EventBus>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store: TaskStore::new(),
            presence,
            pubsub,
            bus,
            config,
        }
    }

    /// The task store; tests and admin surfaces read through it.
    #[must_use]
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Accept a submission; the task starts `pending` and the next tick
    /// routes it.
    pub fn submit(
        &self,
        fleet_id: FleetId,
        requester_id: &AgentId,
        submission: TaskSubmission,
    ) -> Task {
        let ttl_ms = submission
            .ttl_ms
            .unwrap_or(self.config.default_ttl_ms)
            .clamp(1, self.config.max_ttl_ms);
        let task = Task::new(
            fleet_id,
            requester_id.clone(),
            submission.task_type,
            submission.prompt,
            submission.capabilities_required,
            submission.priority,
            Some(ttl_ms),
            submission.correlation_id,
        );
        self.store.insert(task.clone());
        self.publish_task_event(&task, "task_submitted");
        debug!(task_id = %task.task_id, fleet = %fleet_id, "task submitted");
        task
    }

    /// Ingest a `task:result` report. Only the assignee may report; the
    /// requester gets the result envelope on its direct topic.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown tasks, [`HubError::Forbidden`] for
    /// reporters other than the assignee, [`HubError::InvalidStatus`] for
    /// tasks no longer active.
    pub fn ingest_result(
        &self,
        reporter: &AgentId,
        task_id: &TaskId,
        result: Option<Value>,
        error: Option<String>,
    ) -> HubResult<Task> {
        let task = self
            .store
            .get(task_id)
            .ok_or_else(|| HubError::NotFound(format!("task {task_id}")))?;
        if task.assigned_to.as_ref() != Some(reporter) {
            return Err(HubError::Forbidden);
        }

        let updated = match error {
            Some(error) => self.store.fail(task_id, error)?,
            None => self
                .store
                .complete(task_id, result.unwrap_or(Value::Null))?,
        };

        self.push_result(&updated);
        let kind = if updated.status == TaskStatus::Completed {
            "task_completed"
        } else {
            "task_failed"
        };
        self.emit_activity(&updated, kind);
        self.publish_task_event(&updated, kind);
        Ok(updated)
    }

    /// Mark an assigned task running; the assignee reports progress.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`], [`HubError::Forbidden`] or
    /// [`HubError::InvalidStatus`].
    pub fn mark_running(&self, reporter: &AgentId, task_id: &TaskId) -> HubResult<Task> {
        let task = self
            .store
            .get(task_id)
            .ok_or_else(|| HubError::NotFound(format!("task {task_id}")))?;
        if task.assigned_to.as_ref() != Some(reporter) {
            return Err(HubError::Forbidden);
        }
        self.store.start(task_id)
    }

    /// One scheduler tick: route pending tasks, time out overdue work, purge
    /// old rows. Errors are logged per task and never abort the pass.
    pub fn tick(&self) {
        let now = Utc::now();

        // 1. Route every pending task per fleet.
        for (fleet_id, pending) in self.store.pending_by_fleet() {
            let roster = self.presence.list(&fleet_id);
            for task in pending {
                match route_task(&task, &roster, &self.config.local_region) {
                    Ok(agent_id) => match self.store.assign(&task.task_id, &agent_id) {
                        Ok(assigned) => {
                            self.push_assignment(&assigned, &agent_id);
                            self.emit_activity(&assigned, "task_started");
                            self.publish_task_event(&assigned, "task_assigned");
                        }
                        Err(e) => {
                            // Lost to a concurrent transition; next tick sees
                            // the new status.
                            debug!(task_id = %task.task_id, error = %e, "assignment skipped");
                        }
                    },
                    Err(HubError::NoCapableAgent) => {
                        // Routing failure leaves the task pending; silent
                        // retry on the next tick.
                    }
                    Err(e) => warn!(task_id = %task.task_id, error = %e, "routing error"),
                }
            }
        }

        // 2. Time out overdue non-terminal tasks and notify requesters.
        for task in self.store.expired(now) {
            match self.store.timeout(&task.task_id) {
                Ok(timed_out) => {
                    self.push_result(&timed_out);
                    self.emit_activity(&timed_out, "task_failed");
                    self.publish_task_event(&timed_out, "task_timeout");
                }
                Err(e) => debug!(task_id = %task.task_id, error = %e, "timeout skipped"),
            }
        }

        // 3. Purge old terminal rows and stragglers.
        let purged = self.store.purge(now, self.config.cleanup_cutoff_ms);
        if purged > 0 {
            debug!(purged, "task rows purged");
        }
    }

    /// Run [`tick`](Self::tick) on the configured interval until aborted.
    /// The ticker owns its worker; socket handlers never block on it.
    pub fn spawn_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.config.tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.tick();
            }
        })
    }

    fn push_assignment(&self, task: &Task, agent_id: &AgentId) {
        let frame = ServerFrame::event(
            "task:assigned",
            json!({
                "task_id": task.task_id,
                "type": task.task_type,
                "prompt": task.prompt,
                "capabilities_required": task.capabilities_required,
                "requester_id": task.requester_id,
                "priority": task.priority,
                "ttl_ms": task.ttl_ms,
                "correlation_id": task.correlation_id,
            }),
        );
        self.pubsub.publish(
            &topics::fleet_agent(&task.fleet_id, agent_id.as_str()),
            Arc::new(frame),
        );
    }

    fn push_result(&self, task: &Task) {
        let event = if task.status == TaskStatus::Timeout {
            "task:timeout"
        } else {
            "task:result"
        };
        let frame = ServerFrame::event(
            event,
            json!({
                "task_id": task.task_id,
                "status": task.status,
                "result": task.result,
                "error": task.error,
                "assigned_to": task.assigned_to,
                "correlation_id": task.correlation_id,
            }),
        );
        self.pubsub.publish(
            &topics::fleet_agent(&task.fleet_id, task.requester_id.as_str()),
            Arc::new(frame),
        );
    }

    fn emit_activity(&self, task: &Task, kind: &str) {
        let payload = json!({
            "event_id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
            "agent_id": task.assigned_to.as_ref().unwrap_or(&task.requester_id),
            "kind": kind,
            "description": format!("{} {}", kind, task.task_id),
            "tags": [],
            "data": { "task_id": task.task_id, "type": task.task_type },
        });
        self.pubsub.publish(
            &topics::fleet(&task.fleet_id),
            Arc::new(ServerFrame::event("activity:broadcast", payload.clone())),
        );
        let topic = topics::bus_topic(&task.fleet_id.to_string(), EventKind::Activity);
        let partition_key = task
            .assigned_to
            .as_ref()
            .unwrap_or(&task.requester_id)
            .to_string();
        let bus = Arc::clone(&self.bus);
        let kind = kind.to_owned();
        tokio::spawn(async move {
            let event = BusEvent::new(topic.clone(), kind, Some(partition_key), payload);
            if let Err(e) = bus.publish(&topic, event).await {
                warn!(error = %e, topic, "activity publish dropped");
            }
        });
    }

    fn publish_task_event(&self, task: &Task, kind: &str) {
        let topic = topics::bus_topic(&task.fleet_id.to_string(), EventKind::Tasks);
        let payload = json!({
            "task_id": task.task_id,
            "status": task.status,
            "type": task.task_type,
            "agent_id": task.requester_id,
            "assigned_to": task.assigned_to,
        });
        let partition_key = task.requester_id.to_string();
        let bus = Arc::clone(&self.bus);
        let kind = kind.to_owned();
        tokio::spawn(async move {
            let event = BusEvent::new(topic.clone(), kind, Some(partition_key), payload);
            if let Err(e) = bus.publish(&topic, event).await {
                warn!(error = %e, topic, "task event dropped");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringforge_core::{PresenceEntry, PresenceState, SessionId};
    use ringforge_events::LocalBus;

    struct Harness {
        scheduler: Arc<TaskScheduler>,
        presence: Arc<PresenceRegistry>,
        pubsub: Arc<PubSub>,
        fleet_id: FleetId,
    }

    fn harness() -> Harness {
        let pubsub = Arc::new(PubSub::new());
        let presence = Arc::new(PresenceRegistry::new(Arc::clone(&pubsub)));
        let bus = Arc::new(LocalBus::new());
        let scheduler = Arc::new(TaskScheduler::new(
            Arc::clone(&presence),
            Arc::clone(&pubsub),
            bus as Arc<dyn EventBus>,
            SchedulerConfig::default(),
        ));
        Harness {
            scheduler,
            presence,
            pubsub,
            fleet_id: FleetId::new(),
        }
    }

    fn join_agent(h: &Harness, caps: &[&str]) -> AgentId {
        let agent_id = AgentId::generate();
        let mut entry = PresenceEntry::joined(
            SessionId::new(),
            agent_id.clone(),
            None,
            None,
            caps.iter().map(|c| (*c).to_owned()).collect(),
        );
        entry.state = PresenceState::Online;
        h.presence.track(h.fleet_id, entry);
        agent_id
    }

    fn submission(caps: &[&str], ttl_ms: Option<u64>) -> TaskSubmission {
        TaskSubmission {
            task_type: "gen".to_owned(),
            prompt: "x".to_owned(),
            capabilities_required: caps.iter().map(|c| (*c).to_owned()).collect(),
            priority: TaskPriority::Normal,
            ttl_ms,
            correlation_id: None,
        }
    }

    #[tokio::test]
    async fn test_tick_assigns_to_capable_agent_only() {
        let h = harness();
        let coder = join_agent(&h, &["code"]);
        let writer = join_agent(&h, &["summarize"]);

        let (coder_sub, mut coder_rx) = h.pubsub.register();
        h.pubsub.subscribe(
            &topics::fleet_agent(&h.fleet_id, coder.as_str()),
            coder_sub,
        );
        let (writer_sub, mut writer_rx) = h.pubsub.register();
        h.pubsub.subscribe(
            &topics::fleet_agent(&h.fleet_id, writer.as_str()),
            writer_sub,
        );

        let requester = AgentId::generate();
        let task = h
            .scheduler
            .submit(h.fleet_id, &requester, submission(&["code"], None));
        h.scheduler.tick();

        let assigned = h.scheduler.store().get(&task.task_id).unwrap();
        assert_eq!(assigned.status, TaskStatus::Assigned);
        assert_eq!(assigned.assigned_to, Some(coder));

        let frame = coder_rx.recv().await.unwrap();
        assert_eq!(frame.event.as_deref(), Some("task:assigned"));
        assert_eq!(frame.payload["task_id"], task.task_id.as_str());
        assert!(writer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_capable_agent_leaves_pending() {
        let h = harness();
        join_agent(&h, &["summarize"]);
        let requester = AgentId::generate();
        let task = h
            .scheduler
            .submit(h.fleet_id, &requester, submission(&["code"], None));

        h.scheduler.tick();
        assert_eq!(
            h.scheduler.store().get(&task.task_id).unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_expired_task_times_out_and_notifies_requester() {
        let h = harness();
        let requester = AgentId::generate();
        let (sub, mut rx) = h.pubsub.register();
        h.pubsub.subscribe(
            &topics::fleet_agent(&h.fleet_id, requester.as_str()),
            sub,
        );

        let task = h
            .scheduler
            .submit(h.fleet_id, &requester, submission(&["code"], Some(1)));
        // Let the 1 ms TTL lapse, then tick.
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.scheduler.tick();

        let row = h.scheduler.store().get(&task.task_id).unwrap();
        assert_eq!(row.status, TaskStatus::Timeout);

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event.as_deref(), Some("task:timeout"));
        assert_eq!(frame.payload["task_id"], task.task_id.as_str());
    }

    #[tokio::test]
    async fn test_result_ingest_requires_assignee() {
        let h = harness();
        let worker = join_agent(&h, &["code"]);
        let requester = AgentId::generate();
        let task = h
            .scheduler
            .submit(h.fleet_id, &requester, submission(&["code"], None));
        h.scheduler.tick();

        let stranger = AgentId::generate();
        assert!(matches!(
            h.scheduler
                .ingest_result(&stranger, &task.task_id, Some(json!(1)), None),
            Err(HubError::Forbidden)
        ));

        let done = h
            .scheduler
            .ingest_result(&worker, &task.task_id, Some(json!({"answer": 42})), None)
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_result_pushed_to_requester_topic() {
        let h = harness();
        let worker = join_agent(&h, &["code"]);
        let requester = AgentId::generate();
        let (sub, mut rx) = h.pubsub.register();
        h.pubsub.subscribe(
            &topics::fleet_agent(&h.fleet_id, requester.as_str()),
            sub,
        );

        let task = h
            .scheduler
            .submit(h.fleet_id, &requester, submission(&["code"], None));
        h.scheduler.tick();
        h.scheduler
            .ingest_result(&worker, &task.task_id, Some(json!("done")), None)
            .unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event.as_deref(), Some("task:result"));
        assert_eq!(frame.payload["status"], "completed");
        assert_eq!(frame.payload["result"], "done");
    }

    #[tokio::test]
    async fn test_error_report_fails_task() {
        let h = harness();
        let worker = join_agent(&h, &["code"]);
        let requester = AgentId::generate();
        let task = h
            .scheduler
            .submit(h.fleet_id, &requester, submission(&["code"], None));
        h.scheduler.tick();

        let failed = h
            .scheduler
            .ingest_result(&worker, &task.task_id, None, Some("boom".to_owned()))
            .unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_ttl_clamped_to_config_max() {
        let h = harness();
        let requester = AgentId::generate();
        let task = h.scheduler.submit(
            h.fleet_id,
            &requester,
            submission(&[], Some(10_000_000)),
        );
        assert_eq!(task.ttl_ms, 300_000);
    }

    #[tokio::test]
    async fn test_daily_counter_increments_on_submit() {
        let h = harness();
        let requester = AgentId::generate();
        h.scheduler.submit(h.fleet_id, &requester, submission(&[], None));
        h.scheduler.submit(h.fleet_id, &requester, submission(&[], None));
        assert_eq!(
            h.scheduler.store().daily_count(Utc::now().date_naive()),
            2
        );
    }
}
