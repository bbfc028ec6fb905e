//! History replay from the event bus.
//!
//! Replay fetches are inflated (`limit × 10`) and filtered locally by
//! timestamp range, kind set, tag intersection and sender, then truncated to
//! the last `limit` in timestamp order.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ringforge_core::{topics, EventKind, FleetId, HubError, HubResult};
use ringforge_events::ReplayOptions;
use serde_json::Value;

use crate::router::MessageRouter;

/// An `activity:history` request.
#[derive(Debug, Clone, Default)]
pub struct HistoryRequest {
    /// Maximum events returned; clamped to the configured cap.
    pub limit: Option<usize>,
    /// Keep only these kinds.
    pub kinds: Option<BTreeSet<String>>,
    /// Keep events at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Keep events at or before this time.
    pub to: Option<DateTime<Utc>>,
    /// Keep only these senders.
    pub agents: Option<BTreeSet<String>>,
    /// Keep events whose tags intersect this set.
    pub tags: Option<BTreeSet<String>>,
}

impl HistoryRequest {
    fn matches(&self, payload: &Value, timestamp: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if timestamp > to {
                return false;
            }
        }
        if let Some(agents) = &self.agents {
            let sender = payload.get("agent_id").and_then(Value::as_str);
            if !sender.is_some_and(|s| agents.contains(s)) {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            let intersects = payload
                .get("tags")
                .and_then(Value::as_array)
                .is_some_and(|event_tags| {
                    event_tags
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|t| tags.contains(t))
                });
            if !intersects {
                return false;
            }
        }
        true
    }
}

impl MessageRouter {
    /// Replay fleet activity history.
    ///
    /// # Errors
    ///
    /// Propagates bus replay failures as their tagged reasons.
    pub async fn activity_history(
        &self,
        fleet_id: &FleetId,
        request: &HistoryRequest,
    ) -> HubResult<Vec<Value>> {
        let limit = request
            .limit
            .unwrap_or(100)
            .clamp(1, self.config.history_limit_max);
        let topic = topics::bus_topic(&fleet_id.to_string(), EventKind::Activity);
        let events = self
            .bus
            .replay(
                &topic,
                ReplayOptions {
                    limit: limit.saturating_mul(self.config.history_fetch_multiplier),
                    kinds: request.kinds.clone(),
                    from_ts: request.from,
                },
            )
            .await
            .map_err(HubError::from)?;

        let mut matched: Vec<Value> = events
            .into_iter()
            .filter(|e| request.matches(&e.payload, e.effective_timestamp()))
            .map(|e| e.payload)
            .collect();
        let skip = matched.len().saturating_sub(limit);
        matched.drain(..skip);
        Ok(matched)
    }

    /// Replay the direct-message history between two agents, matching
    /// `{from, to}` in either orientation.
    ///
    /// # Errors
    ///
    /// Propagates bus replay failures as their tagged reasons.
    pub async fn direct_history(
        &self,
        fleet_id: &FleetId,
        agent_a: &str,
        agent_b: &str,
        limit: usize,
    ) -> HubResult<Vec<Value>> {
        let limit = limit.clamp(1, self.config.history_limit_max);
        let topic = topics::bus_topic(&fleet_id.to_string(), EventKind::Direct);
        let events = self
            .bus
            .replay(
                &topic,
                ReplayOptions::tail(limit.saturating_mul(self.config.history_fetch_multiplier)),
            )
            .await
            .map_err(HubError::from)?;

        let mut matched: Vec<Value> = events
            .into_iter()
            .map(|e| e.payload)
            .filter(|payload| {
                let from = payload
                    .pointer("/from/agent_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let to = payload.get("to").and_then(Value::as_str).unwrap_or_default();
                (from == agent_a && to == agent_b) || (from == agent_b && to == agent_a)
            })
            .collect();
        let skip = matched.len().saturating_sub(limit);
        matched.drain(..skip);
        Ok(matched)
    }
}
