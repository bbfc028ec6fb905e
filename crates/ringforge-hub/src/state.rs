//! Shared hub state: every component wired together.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ringforge_audit::{AuditSink, AuditStorage, MemoryAuditStorage};
use ringforge_config::{BusBackend, HubConfig};
use ringforge_core::{topics, BusEvent, EventKind};
use ringforge_directory::{AgentDirectory, ChallengeStore, DirectoryStore, MemoryDirectoryStore};
use ringforge_events::{
    EventBus, InProcessBroker, LocalBus, PubSub, StreamingBroker, StreamingBus, StreamingConfig,
};
use ringforge_presence::PresenceRegistry;
use ringforge_router::{MessageRouter, RouterConfig};
use ringforge_scheduler::{SchedulerConfig, TaskScheduler};
use ringforge_store::{DocumentStore, MemoryDocumentStore};
use ringforge_telemetry::HubMetrics;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::warn;

/// Everything a request handler needs, cheaply cloneable via `Arc`.
pub struct HubState {
    /// Loaded configuration.
    pub config: HubConfig,
    /// The pub/sub substrate.
    pub pubsub: Arc<PubSub>,
    /// The event bus backend.
    pub bus: Arc<dyn EventBus>,
    /// Agent identity and key validation.
    pub directory: Arc<AgentDirectory>,
    /// Fleet rosters.
    pub presence: Arc<PresenceRegistry>,
    /// Activity / direct / memory routing.
    pub router: Arc<MessageRouter>,
    /// Task scheduling.
    pub scheduler: Arc<TaskScheduler>,
    /// Security audit sink.
    pub audit: AuditSink,
    /// Prometheus metrics.
    pub metrics: HubMetrics,
    /// Process start, for `/health` uptime.
    pub started_at: Instant,
}

impl HubState {
    /// Build the full component graph from configuration with in-memory
    /// reference backends for the external collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error when metric registration fails.
    pub fn build(config: HubConfig) -> anyhow::Result<Arc<Self>> {
        let directory_store: Arc<dyn DirectoryStore> = Arc::new(MemoryDirectoryStore::new());
        let document_store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let audit_storage: Arc<dyn AuditStorage> = Arc::new(MemoryAuditStorage::new());
        Self::build_with(config, directory_store, document_store, audit_storage)
    }

    /// Build with explicit external-collaborator backends.
    ///
    /// # Errors
    ///
    /// Returns an error when metric registration fails.
    pub fn build_with(
        config: HubConfig,
        directory_store: Arc<dyn DirectoryStore>,
        document_store: Arc<dyn DocumentStore>,
        audit_storage: Arc<dyn AuditStorage>,
    ) -> anyhow::Result<Arc<Self>> {
        let pubsub = Arc::new(PubSub::new());
        let bus = build_bus(&config);

        let challenges = Arc::new(ChallengeStore::with_ttl(Duration::from_millis(
            config.challenge_ttl_ms,
        )));
        let directory = Arc::new(AgentDirectory::new(directory_store, challenges));
        let presence = Arc::new(PresenceRegistry::new(Arc::clone(&pubsub)));

        let router = Arc::new(MessageRouter::new(
            Arc::clone(&directory),
            Arc::clone(&presence),
            Arc::clone(&pubsub),
            Arc::clone(&bus),
            document_store,
            RouterConfig {
                dm_queue_ttl_seconds: config.dm_queue_ttl_seconds,
                dm_queue_ttl_high_priority_seconds: config.dm_queue_ttl_high_priority_seconds,
                ..RouterConfig::default()
            },
        ));

        let scheduler = Arc::new(TaskScheduler::new(
            Arc::clone(&presence),
            Arc::clone(&pubsub),
            Arc::clone(&bus),
            SchedulerConfig {
                tick_interval: Duration::from_millis(config.task_tick_ms),
                default_ttl_ms: config.task_default_ttl_ms,
                max_ttl_ms: config.task_max_ttl_ms,
                cleanup_cutoff_ms: config.task_cleanup_cutoff_ms,
                local_region: config.local_region.clone(),
            },
        ));

        let audit = AuditSink::new(audit_storage, Arc::clone(&bus));
        let metrics = HubMetrics::new()?;

        Ok(Arc::new(Self {
            config,
            pubsub,
            bus,
            directory,
            presence,
            router,
            scheduler,
            audit,
            metrics,
            started_at: Instant::now(),
        }))
    }

    /// Spawn the background workers: the scheduler ticker and the challenge
    /// sweeper. Handlers never block on either.
    #[must_use]
    pub fn spawn_background(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let ticker = self.scheduler.spawn_ticker();
        let sweeper = self
            .directory
            .challenges()
            .spawn_sweeper(Duration::from_millis(self.config.challenge_sweep_ms));
        vec![ticker, sweeper]
    }

    /// Publish an auth telemetry event, best-effort.
    pub fn publish_auth_telemetry(
        self: &Arc<Self>,
        fleet_segment: String,
        method: &'static str,
        success: bool,
    ) {
        self.metrics
            .auth_attempts
            .with_label_values(&[method, if success { "success" } else { "failure" }])
            .inc();
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            let topic = topics::bus_topic(&fleet_segment, EventKind::Telemetry);
            let event = BusEvent::new(
                topic.clone(),
                "auth",
                None,
                json!({ "method": method, "success": success }),
            );
            if let Err(e) = bus.publish(&topic, event).await {
                warn!(error = %e, topic, "telemetry publish dropped");
            }
        });
    }
}

fn build_bus(config: &HubConfig) -> Arc<dyn EventBus> {
    match config.event_bus_backend {
        BusBackend::Local => Arc::new(LocalBus::with_capacity(
            config.local_bus_max_events_per_topic,
        )),
        BusBackend::Kafka | BusBackend::Pulsar => {
            // The broker transport behind StreamingBus is pluggable; the
            // in-process partitioned log serves single-node deployments.
            let broker: Arc<dyn StreamingBroker> = Arc::new(InProcessBroker::new());
            Arc::new(StreamingBus::new(
                broker,
                StreamingConfig {
                    client_id: config.bus_client_id.clone(),
                    brokers: config.bus_brokers.clone(),
                    max_in_flight: config.bus_max_queue_size,
                    publish_timeout: Duration::from_millis(config.bus_publish_timeout_ms),
                    replay_timeout: Duration::from_millis(config.bus_replay_timeout_ms),
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_local_backend() {
        let state = HubState::build(HubConfig::default()).unwrap();
        assert_eq!(state.config.event_bus_backend, BusBackend::Local);
        // The bus accepts a publish.
        let event = BusEvent::new("t.activity", "k", None, json!({}));
        assert!(state.bus.publish("t.activity", event).await.is_ok());
    }

    #[tokio::test]
    async fn test_build_streaming_backend() {
        let config = HubConfig {
            event_bus_backend: BusBackend::Kafka,
            bus_brokers: vec!["broker-1:9092".to_owned()],
            ..HubConfig::default()
        };
        let state = HubState::build(config).unwrap();
        let event = BusEvent::new("t.activity", "k", None, json!({}));
        assert!(state.bus.publish("t.activity", event).await.is_ok());
    }
}
