//! The fire-and-forget audit sink.

use std::sync::Arc;

use ringforge_core::{topics, BusEvent, EventKind};
use ringforge_events::EventBus;
use tracing::warn;

use crate::entry::AuditEntry;
use crate::storage::AuditStorage;

/// Records audit entries without ever blocking or failing the caller.
///
/// Each entry is handed to a detached task that appends to storage and
/// publishes on `{fleet|"system"}.audit`; both failures are logged at warn
/// and dropped.
#[derive(Clone)]
pub struct AuditSink {
    storage: Arc<dyn AuditStorage>,
    bus: Arc<dyn EventBus>,
}

impl AuditSink {
    /// Create a sink over a storage backend and the event bus.
    #[must_use]
    pub fn new(storage: Arc<dyn AuditStorage>, bus: Arc<dyn EventBus>) -> Self {
        Self { storage, bus }
    }

    /// Record an entry. Returns immediately.
    pub fn record(&self, entry: AuditEntry) {
        let storage = Arc::clone(&self.storage);
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            if let Err(e) = storage.append(&entry).await {
                warn!(error = %e, action = entry.action.as_str(), "audit append failed");
            }
            let topic = topics::bus_topic(&entry.fleet_segment(), EventKind::Audit);
            let payload = match serde_json::to_value(&entry) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "audit entry not serializable");
                    return;
                }
            };
            let event = BusEvent::new(
                topic.clone(),
                entry.action.as_str(),
                entry.agent_id.as_ref().map(ToString::to_string),
                payload,
            );
            if let Err(e) = bus.publish(&topic, event).await {
                warn!(error = %e, topic, "audit publish failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditAction, AuditOutcome};
    use crate::storage::{FailingAuditStorage, MemoryAuditStorage};
    use ringforge_events::{LocalBus, ReplayOptions};
    use serde_json::json;
    use std::time::Duration;

    fn entry() -> AuditEntry {
        AuditEntry::new(
            None,
            Some(ringforge_core::AgentId::generate()),
            AuditAction::AuthFailed,
            AuditOutcome::Failure {
                reason: "invalid".to_owned(),
            },
            json!({"method": "api_key"}),
        )
    }

    #[tokio::test]
    async fn test_record_appends_and_publishes() {
        let storage = Arc::new(MemoryAuditStorage::new());
        let bus = Arc::new(LocalBus::new());
        let sink = AuditSink::new(
            Arc::clone(&storage) as Arc<dyn AuditStorage>,
            Arc::clone(&bus) as Arc<dyn EventBus>,
        );

        sink.record(entry());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(storage.count().await.unwrap(), 1);
        let events = bus
            .replay("system.audit", ReplayOptions::tail(10))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "auth_failed");
    }

    #[tokio::test]
    async fn test_storage_failure_never_surfaces() {
        let bus = Arc::new(LocalBus::new());
        let sink = AuditSink::new(
            Arc::new(FailingAuditStorage) as Arc<dyn AuditStorage>,
            Arc::clone(&bus) as Arc<dyn EventBus>,
        );

        // Does not panic and still publishes to the bus.
        sink.record(entry());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let events = bus
            .replay("system.audit", ReplayOptions::tail(10))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
    }
}
