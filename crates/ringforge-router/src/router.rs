//! The message router: construction and activity broadcast.

use std::sync::Arc;

use ringforge_core::{
    topics, AgentId, BusEvent, EventKind, FleetId, HubResult, ServerFrame,
};
use ringforge_directory::AgentDirectory;
use ringforge_events::{EventBus, PubSub};
use ringforge_presence::PresenceRegistry;
use ringforge_store::DocumentStore;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::activity::{ActivityKind, ActivityScope};

/// Router tunables.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Offline direct-message TTL in seconds.
    pub dm_queue_ttl_seconds: u64,
    /// Offline TTL for high/critical priority messages, in seconds.
    pub dm_queue_ttl_high_priority_seconds: u64,
    /// Hard cap on history limits.
    pub history_limit_max: usize,
    /// Replay fetches are inflated by this factor before local filtering.
    pub history_fetch_multiplier: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            dm_queue_ttl_seconds: 300,
            dm_queue_ttl_high_priority_seconds: 86_400,
            history_limit_max: 1000,
            history_fetch_multiplier: 10,
        }
    }
}

/// The authenticated sender of a routed message.
#[derive(Debug, Clone)]
pub struct SenderContext {
    /// Fleet the session joined.
    pub fleet_id: FleetId,
    /// Sending agent.
    pub agent_id: AgentId,
    /// Sender display name.
    pub name: Option<String>,
}

/// Routes activity, direct messages and shared memory for every fleet.
pub struct MessageRouter {
    pub(crate) directory: Arc<AgentDirectory>,
    pub(crate) presence: Arc<PresenceRegistry>,
    pub(crate) pubsub: Arc<PubSub>,
    pub(crate) bus: Arc<dyn EventBus>,
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) config: RouterConfig,
}

impl MessageRouter {
    /// Wire up the router.
    #[must_use]
    pub fn new(
        directory: Arc<AgentDirectory>,
        presence: Arc<PresenceRegistry>,
        pubsub: Arc<PubSub>,
        bus: Arc<dyn EventBus>,
        store: Arc<dyn DocumentStore>,
        config: RouterConfig,
    ) -> Self {
        Self {
            directory,
            presence,
            pubsub,
            bus,
            store,
            config,
        }
    }

    /// Broadcast an activity event. The scope picks the recipients; the
    /// event is also published to `{fleet}.activity` asynchronously,
    /// best-effort. Returns the event ID.
    ///
    /// # Errors
    ///
    /// [`ringforge_core::HubError::InvalidKind`] for kinds outside the closed
    /// set, [`ringforge_core::HubError::InvalidPayload`] for malformed scopes.
    pub fn broadcast_activity(
        &self,
        ctx: &SenderContext,
        payload: &Value,
    ) -> HubResult<String> {
        let kind = ActivityKind::parse(
            payload
                .get("kind")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        )?;
        let scope = ActivityScope::from_payload(payload)?;

        let event_id = format!("evt_{}", Uuid::new_v4().simple());
        let event_payload = json!({
            "event_id": event_id,
            "agent_id": ctx.agent_id,
            "name": ctx.name,
            "kind": kind.as_str(),
            "description": payload.get("description").cloned().unwrap_or(Value::Null),
            "tags": payload.get("tags").cloned().unwrap_or_else(|| json!([])),
            "data": payload.get("data").cloned().unwrap_or(Value::Null),
        });
        let frame = Arc::new(ServerFrame::event("activity:broadcast", event_payload.clone()));

        match &scope {
            ActivityScope::Fleet => {
                self.pubsub.publish(&topics::fleet(&ctx.fleet_id), frame);
            }
            ActivityScope::Tagged(tags) => {
                for tag in tags {
                    self.pubsub
                        .publish(&topics::fleet_tag(&ctx.fleet_id, tag), Arc::clone(&frame));
                }
            }
            ActivityScope::Direct(to) => {
                self.pubsub
                    .publish(&topics::fleet_agent(&ctx.fleet_id, to), frame);
            }
        }

        self.publish_to_bus(
            topics::bus_topic(&ctx.fleet_id.to_string(), EventKind::Activity),
            kind.as_str().to_owned(),
            Some(ctx.agent_id.to_string()),
            event_payload,
        );
        self.note_sender_message(&ctx.agent_id);
        Ok(event_id)
    }

    /// Append to the bus on a detached task; failures are logged and
    /// discarded (delivery stays durable for the live recipients).
    pub(crate) fn publish_to_bus(
        &self,
        topic: String,
        kind: String,
        partition_key: Option<String>,
        payload: Value,
    ) {
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            let event = BusEvent::new(topic.clone(), kind, partition_key, payload);
            if let Err(e) = bus.publish(&topic, event).await {
                warn!(error = %e, topic, "bus publish dropped");
            }
        });
    }

    /// Bump the sender's message counter without blocking the action.
    pub(crate) fn note_sender_message(&self, agent_id: &AgentId) {
        let directory = Arc::clone(&self.directory);
        let agent_id = agent_id.clone();
        tokio::spawn(async move {
            if let Err(e) = directory.note_message(&agent_id).await {
                warn!(error = %e, agent = %agent_id, "message counter update failed");
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use ringforge_core::{ApiKeyKind, ApiKeyRecord, PresenceEntry, SessionId, TenantId};
    use ringforge_directory::{ChallengeStore, DirectoryStore, MemoryDirectoryStore, RegisterMeta};
    use ringforge_events::LocalBus;
    use ringforge_store::MemoryDocumentStore;
    use std::collections::BTreeSet;

    pub(crate) struct Harness {
        pub(crate) router: MessageRouter,
        pub(crate) pubsub: Arc<PubSub>,
        pub(crate) bus: Arc<LocalBus>,
        pub(crate) store: Arc<MemoryDocumentStore>,
        pub(crate) presence: Arc<PresenceRegistry>,
        pub(crate) directory: Arc<AgentDirectory>,
        pub(crate) fleet_id: FleetId,
        pub(crate) key: ApiKeyRecord,
    }

    pub(crate) async fn harness() -> Harness {
        let dir_store = Arc::new(MemoryDirectoryStore::new());
        let raw = ringforge_crypto::RawApiKey::generate("live");
        let key = ApiKeyRecord {
            key_hash: raw.hash(),
            prefix: raw.prefix(),
            kind: ApiKeyKind::Live,
            tenant_id: TenantId::new(),
            fleet_id: Some(FleetId::new()),
            expires_at: None,
            revoked_at: None,
        };
        dir_store.insert_api_key(key.clone()).await.unwrap();

        let directory = Arc::new(AgentDirectory::new(
            dir_store,
            Arc::new(ChallengeStore::new()),
        ));
        let pubsub = Arc::new(PubSub::new());
        let presence = Arc::new(PresenceRegistry::new(Arc::clone(&pubsub)));
        let bus = Arc::new(LocalBus::new());
        let store = Arc::new(MemoryDocumentStore::new());

        let router = MessageRouter::new(
            Arc::clone(&directory),
            Arc::clone(&presence),
            Arc::clone(&pubsub),
            Arc::clone(&bus) as Arc<dyn EventBus>,
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            RouterConfig::default(),
        );
        Harness {
            router,
            pubsub,
            bus,
            store,
            presence,
            directory,
            fleet_id: key.fleet_id.expect("fleet-scoped key"),
            key,
        }
    }

    pub(crate) async fn register(h: &Harness, name: &str) -> SenderContext {
        let agent = h
            .directory
            .register_or_reconnect(
                &h.key,
                RegisterMeta {
                    name: Some(name.to_owned()),
                    framework: Some("x".to_owned()),
                    capabilities: BTreeSet::from(["code".to_owned()]),
                    ..RegisterMeta::default()
                },
            )
            .await
            .unwrap();
        SenderContext {
            fleet_id: agent.fleet_id,
            agent_id: agent.agent_id,
            name: agent.name,
        }
    }

    pub(crate) fn join(h: &Harness, ctx: &SenderContext) -> SessionId {
        let session_id = SessionId::new();
        h.presence.track(
            h.fleet_id,
            PresenceEntry::joined(
                session_id,
                ctx.agent_id.clone(),
                ctx.name.clone(),
                Some("x".to_owned()),
                BTreeSet::from(["code".to_owned()]),
            ),
        );
        session_id
    }
}
