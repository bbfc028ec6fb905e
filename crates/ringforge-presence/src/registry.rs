//! The presence registry.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use ringforge_core::{
    topics, AgentId, FleetId, HubError, HubResult, PresenceEntry, PresenceState, ServerFrame,
    SessionId,
};
use ringforge_events::PubSub;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Fields a `presence:update` may touch. Anything else on the wire is
/// ignored; a state outside the enum rejects the whole patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresencePatch {
    /// New liveness state.
    #[serde(default)]
    pub state: Option<String>,
    /// Current task label.
    #[serde(default)]
    pub task: Option<String>,
    /// Load factor; clamped into `[0, 1]`.
    #[serde(default)]
    pub load: Option<f64>,
    /// Metadata keys to merge.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Per-fleet roster with a diff stream over the pub/sub substrate.
pub struct PresenceRegistry {
    fleets: DashMap<FleetId, HashMap<AgentId, Vec<PresenceEntry>>>,
    pubsub: Arc<PubSub>,
}

impl PresenceRegistry {
    /// Create a registry publishing diffs on the given broker.
    #[must_use]
    pub fn new(pubsub: Arc<PubSub>) -> Self {
        Self {
            fleets: DashMap::new(),
            pubsub,
        }
    }

    /// Track a freshly joined session and broadcast `presence:joined`.
    pub fn track(&self, fleet_id: FleetId, entry: PresenceEntry) {
        let frame = ServerFrame::event(
            "presence:joined",
            json!({
                "agent_id": entry.agent_id,
                "name": entry.name,
                "framework": entry.framework,
                "capabilities": entry.capabilities,
                "state": entry.state,
                "connected_at": entry.connected_at,
            }),
        );
        {
            let mut fleet = self.fleets.entry(fleet_id).or_default();
            fleet
                .entry(entry.agent_id.clone())
                .or_default()
                .push(entry.clone());
        }
        debug!(fleet = %fleet_id, agent = %entry.agent_id, "presence tracked");
        self.pubsub.publish(&topics::fleet(&fleet_id), Arc::new(frame));
    }

    /// Apply a patch to the session's entry and broadcast
    /// `presence:state_changed`.
    ///
    /// # Errors
    ///
    /// [`HubError::InvalidState`] for states outside the enum,
    /// [`HubError::NotFound`] when the session has no entry.
    pub fn update(
        &self,
        fleet_id: FleetId,
        session_id: SessionId,
        agent_id: &AgentId,
        patch: &PresencePatch,
    ) -> HubResult<PresenceEntry> {
        // Validate before touching the entry so a bad patch is a no-op.
        let state = match patch.state.as_deref() {
            Some(s) => Some(
                PresenceState::parse(s).ok_or_else(|| HubError::InvalidState(s.to_owned()))?,
            ),
            None => None,
        };

        let mut fleet = self
            .fleets
            .get_mut(&fleet_id)
            .ok_or_else(|| HubError::NotFound(format!("fleet {fleet_id} roster")))?;
        let entries = fleet
            .get_mut(agent_id)
            .ok_or_else(|| HubError::NotFound(format!("presence for {agent_id}")))?;
        let entry = entries
            .iter_mut()
            .find(|e| e.session_id == session_id)
            .ok_or_else(|| HubError::NotFound(format!("presence session {session_id}")))?;

        if let Some(state) = state {
            entry.state = state;
        }
        if let Some(task) = &patch.task {
            entry.current_task = Some(task.clone());
        }
        if let Some(load) = patch.load {
            entry.load = load.clamp(0.0, 1.0);
        }
        if let Some(metadata) = &patch.metadata {
            for (k, v) in metadata {
                entry.metadata.insert(k.clone(), v.clone());
            }
        }
        let updated = entry.clone();
        drop(fleet);

        let frame = ServerFrame::event(
            "presence:state_changed",
            json!({
                "agent_id": updated.agent_id,
                "name": updated.name,
                "state": updated.state,
                "task": updated.current_task,
                "load": updated.load,
            }),
        );
        self.pubsub.publish(&topics::fleet(&fleet_id), Arc::new(frame));
        Ok(updated)
    }

    /// Remove the session's entry on socket death and broadcast
    /// `presence:left`. Returns the removed entry, when one existed.
    pub fn untrack(&self, fleet_id: FleetId, session_id: SessionId) -> Option<PresenceEntry> {
        let removed = {
            let mut fleet = self.fleets.get_mut(&fleet_id)?;
            let mut removed = None;
            fleet.retain(|_, entries| {
                if removed.is_none() {
                    if let Some(idx) = entries.iter().position(|e| e.session_id == session_id) {
                        removed = Some(entries.remove(idx));
                    }
                }
                !entries.is_empty()
            });
            removed
        }?;

        let frame = ServerFrame::event(
            "presence:left",
            json!({
                "agent_id": removed.agent_id,
                "name": removed.name,
            }),
        );
        self.pubsub.publish(&topics::fleet(&fleet_id), Arc::new(frame));
        debug!(fleet = %fleet_id, agent = %removed.agent_id, "presence untracked");
        Some(removed)
    }

    /// The full roster of a fleet.
    #[must_use]
    pub fn list(&self, fleet_id: &FleetId) -> Vec<PresenceEntry> {
        self.fleets.get(fleet_id).map_or_else(Vec::new, |fleet| {
            fleet.values().flatten().cloned().collect()
        })
    }

    /// Whether an agent has at least one live entry in the fleet.
    #[must_use]
    pub fn is_online(&self, fleet_id: &FleetId, agent_id: &AgentId) -> bool {
        self.fleets
            .get(fleet_id)
            .is_some_and(|fleet| fleet.get(agent_id).is_some_and(|v| !v.is_empty()))
    }

    /// Every session currently attached to a fleet; drain uses this.
    #[must_use]
    pub fn sessions(&self, fleet_id: &FleetId) -> Vec<SessionId> {
        self.fleets.get(fleet_id).map_or_else(Vec::new, |fleet| {
            fleet.values().flatten().map(|e| e.session_id).collect()
        })
    }

    /// Fleets with at least one tracked entry.
    #[must_use]
    pub fn fleets(&self) -> Vec<FleetId> {
        self.fleets.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn entry(agent_id: &AgentId, session_id: SessionId) -> PresenceEntry {
        PresenceEntry::joined(
            session_id,
            agent_id.clone(),
            Some("a1".into()),
            Some("x".into()),
            BTreeSet::from(["code".to_owned()]),
        )
    }

    fn registry() -> (Arc<PubSub>, PresenceRegistry) {
        let pubsub = Arc::new(PubSub::new());
        let registry = PresenceRegistry::new(Arc::clone(&pubsub));
        (pubsub, registry)
    }

    #[tokio::test]
    async fn test_track_broadcasts_joined() {
        let (pubsub, registry) = registry();
        let fleet = FleetId::new();
        let (sub, mut rx) = pubsub.register();
        pubsub.subscribe(&topics::fleet(&fleet), sub);

        let agent = AgentId::generate();
        registry.track(fleet, entry(&agent, SessionId::new()));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event.as_deref(), Some("presence:joined"));
        assert_eq!(frame.payload["state"], "online");
        assert_eq!(registry.list(&fleet).len(), 1);
        assert!(registry.is_online(&fleet, &agent));
    }

    #[tokio::test]
    async fn test_update_merges_and_broadcasts() {
        let (pubsub, registry) = registry();
        let fleet = FleetId::new();
        let agent = AgentId::generate();
        let session = SessionId::new();
        registry.track(fleet, entry(&agent, session));

        let (sub, mut rx) = pubsub.register();
        pubsub.subscribe(&topics::fleet(&fleet), sub);

        let patch = PresencePatch {
            state: Some("busy".into()),
            task: Some("summarizing".into()),
            load: Some(1.7),
            metadata: Some(
                [("region".to_owned(), Value::String("eu".into()))]
                    .into_iter()
                    .collect(),
            ),
        };
        let updated = registry.update(fleet, session, &agent, &patch).unwrap();
        assert_eq!(updated.state, PresenceState::Busy);
        assert_eq!(updated.current_task.as_deref(), Some("summarizing"));
        assert_eq!(updated.load, 1.0);
        assert_eq!(updated.region(), Some("eu"));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event.as_deref(), Some("presence:state_changed"));
        assert_eq!(frame.payload["state"], "busy");
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_state() {
        let (_pubsub, registry) = registry();
        let fleet = FleetId::new();
        let agent = AgentId::generate();
        let session = SessionId::new();
        registry.track(fleet, entry(&agent, session));

        let patch = PresencePatch {
            state: Some("sleeping".into()),
            ..PresencePatch::default()
        };
        assert!(matches!(
            registry.update(fleet, session, &agent, &patch),
            Err(HubError::InvalidState(_))
        ));
        // The bad patch left the entry untouched.
        assert_eq!(registry.list(&fleet)[0].state, PresenceState::Online);
    }

    #[tokio::test]
    async fn test_untrack_broadcasts_left() {
        let (pubsub, registry) = registry();
        let fleet = FleetId::new();
        let agent = AgentId::generate();
        let session = SessionId::new();
        registry.track(fleet, entry(&agent, session));

        let (sub, mut rx) = pubsub.register();
        pubsub.subscribe(&topics::fleet(&fleet), sub);

        let removed = registry.untrack(fleet, session).unwrap();
        assert_eq!(removed.agent_id, agent);
        assert!(!registry.is_online(&fleet, &agent));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event.as_deref(), Some("presence:left"));
    }

    #[tokio::test]
    async fn test_multiple_sockets_per_agent() {
        let (_pubsub, registry) = registry();
        let fleet = FleetId::new();
        let agent = AgentId::generate();
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        registry.track(fleet, entry(&agent, s1));
        registry.track(fleet, entry(&agent, s2));

        assert_eq!(registry.list(&fleet).len(), 2);
        registry.untrack(fleet, s1);
        // Still online through the second socket.
        assert!(registry.is_online(&fleet, &agent));
        registry.untrack(fleet, s2);
        assert!(!registry.is_online(&fleet, &agent));
    }

    #[tokio::test]
    async fn test_untrack_unknown_session_is_none() {
        let (_pubsub, registry) = registry();
        assert!(registry.untrack(FleetId::new(), SessionId::new()).is_none());
    }
}
