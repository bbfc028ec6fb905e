//! Direct-message delivery and the offline queue.

use std::sync::Arc;

use chrono::Utc;
use ringforge_core::{
    topics, AgentId, DirectEnvelope, EnvelopeSender, EventKind, FleetId, HubError, HubResult,
    MessageId, ServerFrame,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::router::{MessageRouter, SenderContext};

/// The always-valid dashboard target.
pub(crate) const DASHBOARD_TARGET: &str = "dashboard";

impl MessageRouter {
    /// Send a direct message. Online targets get a live push and
    /// `delivered`; offline targets get the envelope queued in the document
    /// store under `dmq:{fleet}:{to}:{message_id}` and `queued`. A store
    /// failure during queueing is logged and does not fail the send.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] when the target is neither in the directory
    /// (same fleet) nor in the live roster.
    pub async fn send_direct(
        &self,
        ctx: &SenderContext,
        to: &str,
        message: Value,
        correlation_id: Option<String>,
    ) -> HubResult<(MessageId, &'static str)> {
        self.resolve_target(ctx, to).await?;

        let envelope = DirectEnvelope::new(
            EnvelopeSender {
                agent_id: ctx.agent_id.clone(),
                name: ctx.name.clone(),
            },
            to,
            message,
            correlation_id,
        );
        let envelope_json = serde_json::to_value(&envelope)
            .map_err(|e| HubError::Internal(format!("envelope serialization: {e}")))?;

        // Live publish first; the session owns its socket and drains the
        // topic queue.
        self.pubsub.publish(
            &topics::fleet_agent(&ctx.fleet_id, to),
            Arc::new(ServerFrame::event("direct_message", envelope_json.clone())),
        );

        let online = AgentId::parse(to)
            .ok()
            .is_some_and(|target| self.presence.is_online(&ctx.fleet_id, &target))
            || to == DASHBOARD_TARGET;

        let status = if online {
            "delivered"
        } else {
            let key = topics::dm_queue_key(&ctx.fleet_id, to, envelope.message_id.as_str());
            let body = envelope_json.to_string();
            match self.store.put_document(&key, b"{}", body.as_bytes()).await {
                Ok(()) => "queued",
                Err(e) => {
                    // Live publish already succeeded; the loss is the
                    // offline copy only.
                    warn!(error = %e, key, "offline queue write failed");
                    "delivered"
                }
            }
        };

        self.publish_to_bus(
            topics::bus_topic(&ctx.fleet_id.to_string(), EventKind::Direct),
            "direct_message".to_owned(),
            Some(ctx.agent_id.to_string()),
            envelope_json,
        );
        self.note_sender_message(&ctx.agent_id);
        debug!(message_id = %envelope.message_id, to, status, "direct message routed");
        Ok((envelope.message_id, status))
    }

    /// Deliver and drain the offline queue for a joining agent. Non-expired
    /// envelopes are pushed to the agent topic and deleted; expired ones are
    /// deleted in place. Listing failures are logged and do not fail the
    /// join. Returns how many envelopes were delivered.
    pub async fn flush_offline_queue(&self, fleet_id: FleetId, agent_id: &AgentId) -> usize {
        let prefix = topics::dm_queue_prefix(&fleet_id, agent_id.as_str());
        let keys = match self.store.list_documents().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, agent = %agent_id, "offline queue listing failed");
                return 0;
            }
        };

        let now = Utc::now();
        let mut delivered = 0;
        for key in keys.into_iter().filter(|k| k.starts_with(&prefix)) {
            let doc = match self.store.get_document(&key).await {
                Ok(Some(doc)) => doc,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, key, "offline queue read failed");
                    continue;
                }
            };
            let Ok(envelope) = serde_json::from_slice::<DirectEnvelope>(&doc.body) else {
                warn!(key, "dropping undecodable queued envelope");
                let _ = self.store.delete_document(&key).await;
                continue;
            };

            if envelope.is_expired(
                now,
                self.config.dm_queue_ttl_seconds,
                self.config.dm_queue_ttl_high_priority_seconds,
            ) {
                debug!(key, "expired queued envelope deleted");
                let _ = self.store.delete_document(&key).await;
                continue;
            }

            let payload = serde_json::to_value(&envelope).unwrap_or(Value::Null);
            self.pubsub.publish(
                &topics::fleet_agent(&fleet_id, agent_id.as_str()),
                Arc::new(ServerFrame::event("direct_message", payload)),
            );
            if let Err(e) = self.store.delete_document(&key).await {
                warn!(error = %e, key, "queued envelope delete failed");
            }
            delivered += 1;
        }
        delivered
    }

    async fn resolve_target(&self, ctx: &SenderContext, to: &str) -> HubResult<()> {
        if to == DASHBOARD_TARGET {
            return Ok(());
        }
        if let Ok(target) = AgentId::parse(to) {
            if let Some(record) = self.directory.store().get_agent(&target).await? {
                if record.fleet_id == ctx.fleet_id {
                    return Ok(());
                }
                return Err(HubError::NotFound(format!("target {to} not in fleet")));
            }
            // Not in the directory, but a live roster entry still counts.
            if self.presence.is_online(&ctx.fleet_id, &target) {
                return Ok(());
            }
        }
        Err(HubError::NotFound(format!("target {to} not in fleet")))
    }

    /// The roster payload pushed to a joining session.
    #[must_use]
    pub fn roster_payload(&self, fleet_id: &FleetId) -> Value {
        json!({ "agents": self.presence.list(fleet_id) })
    }
}
