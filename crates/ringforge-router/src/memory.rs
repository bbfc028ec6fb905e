//! Fleet-shared memory over the document store.
//!
//! Values are opaque JSON under `mem:{fleet}:{key}`. Watchers subscribe to
//! `memory:{fleet}:{key}` for one key or `memory:{fleet}:_all` for the whole
//! fleet; every change also lands on the `{fleet}.memory` bus topic
//! partitioned by key.

use std::sync::Arc;

use ringforge_core::{topics, EventKind, FleetId, HubError, HubResult, ServerFrame};
use serde_json::{json, Value};

use crate::router::{MessageRouter, SenderContext};

impl MessageRouter {
    /// Write a shared-memory value and broadcast `memory:changed`.
    ///
    /// # Errors
    ///
    /// Propagates document-store failures as their tagged reasons.
    pub async fn memory_set(
        &self,
        ctx: &SenderContext,
        key: &str,
        value: &Value,
    ) -> HubResult<()> {
        let doc_key = topics::memory_doc_key(&ctx.fleet_id, key);
        let body = value.to_string();
        self.store
            .put_document(&doc_key, b"{}", body.as_bytes())
            .await
            .map_err(|e| HubError::Unavailable(format!("memory write: {e}")))?;

        self.broadcast_memory_change(ctx, key, json!({
            "key": key,
            "value": value,
            "deleted": false,
            "agent_id": ctx.agent_id,
        }));
        Ok(())
    }

    /// Read a shared-memory value.
    ///
    /// # Errors
    ///
    /// [`HubError::Unavailable`] on store failure.
    pub async fn memory_get(&self, fleet_id: &FleetId, key: &str) -> HubResult<Option<Value>> {
        let doc_key = topics::memory_doc_key(fleet_id, key);
        let doc = self
            .store
            .get_document(&doc_key)
            .await
            .map_err(|e| HubError::Unavailable(format!("memory read: {e}")))?;
        Ok(doc.and_then(|doc| serde_json::from_slice(&doc.body).ok()))
    }

    /// Delete a shared-memory value; broadcasts when something was removed.
    ///
    /// # Errors
    ///
    /// [`HubError::Unavailable`] on store failure.
    pub async fn memory_delete(&self, ctx: &SenderContext, key: &str) -> HubResult<bool> {
        let doc_key = topics::memory_doc_key(&ctx.fleet_id, key);
        let existed = self
            .store
            .delete_document(&doc_key)
            .await
            .map_err(|e| HubError::Unavailable(format!("memory delete: {e}")))?;
        if existed {
            self.broadcast_memory_change(ctx, key, json!({
                "key": key,
                "value": Value::Null,
                "deleted": true,
                "agent_id": ctx.agent_id,
            }));
        }
        Ok(existed)
    }

    fn broadcast_memory_change(&self, ctx: &SenderContext, key: &str, payload: Value) {
        let frame = Arc::new(ServerFrame::event("memory:changed", payload.clone()));
        self.pubsub
            .publish(&topics::memory_key(&ctx.fleet_id, key), Arc::clone(&frame));
        self.pubsub
            .publish(&topics::memory_all(&ctx.fleet_id), frame);
        self.publish_to_bus(
            topics::bus_topic(&ctx.fleet_id.to_string(), EventKind::Memory),
            "memory_changed".to_owned(),
            Some(key.to_owned()),
            payload,
        );
    }
}
