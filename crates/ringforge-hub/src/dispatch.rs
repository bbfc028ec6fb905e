//! Inbound frame dispatch, keyed by action string.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ringforge_core::{
    topics, ClientFrame, HubError, HubResult, ServerFrame, SessionId, TaskId, TaskPriority,
};
use ringforge_events::SubscriberId;
use ringforge_presence::PresencePatch;
use ringforge_router::{HistoryRequest, SenderContext};
use ringforge_scheduler::TaskSubmission;
use serde_json::{json, Value};

use crate::ratelimit::TokenBucket;
use crate::state::HubState;

/// Mutable per-session dispatch state.
pub(crate) struct SessionState {
    pub(crate) ctx: SenderContext,
    pub(crate) session_id: SessionId,
    pub(crate) subscriber: SubscriberId,
    pub(crate) tags: HashSet<String>,
    pub(crate) bucket: TokenBucket,
}

/// Handle one client frame; every action gets a reply frame (result or
/// inline error). Server pushes ride the pub/sub substrate instead.
pub(crate) async fn handle_frame(
    state: &Arc<HubState>,
    session: &mut SessionState,
    frame: &ClientFrame,
) -> ServerFrame {
    let action = frame.action().to_owned();
    let correlation_id = frame.correlation_id().map(ToOwned::to_owned);

    if !session.bucket.try_acquire() {
        return ServerFrame::error(&action, &HubError::RateLimited, correlation_id.as_deref());
    }

    match dispatch(state, session, &action, &frame.payload).await {
        Ok(payload) => ServerFrame::result(&action, payload, correlation_id.as_deref()),
        Err(e) => ServerFrame::error(&action, &e, correlation_id.as_deref()),
    }
}

async fn dispatch(
    state: &Arc<HubState>,
    session: &mut SessionState,
    action: &str,
    payload: &Value,
) -> HubResult<Value> {
    match action {
        "presence:update" => {
            let patch: PresencePatch = serde_json::from_value(payload.clone())
                .map_err(|e| HubError::InvalidPayload(e.to_string()))?;
            state.presence.update(
                session.ctx.fleet_id,
                session.session_id,
                &session.ctx.agent_id,
                &patch,
            )?;
            Ok(json!({ "status": "updated" }))
        }
        "presence:roster" => Ok(state.router.roster_payload(&session.ctx.fleet_id)),
        "activity:broadcast" => {
            let event_id = state.router.broadcast_activity(&session.ctx, payload)?;
            state.metrics.messages_routed.with_label_values(&["activity"]).inc();
            Ok(json!({ "event_id": event_id }))
        }
        "activity:subscribe" => {
            let tags = string_list(payload, "tags")?;
            for tag in &tags {
                state.pubsub.subscribe(
                    &topics::fleet_tag(&session.ctx.fleet_id, tag),
                    session.subscriber,
                );
                session.tags.insert(tag.clone());
            }
            Ok(json!({ "subscribed_tags": sorted(&session.tags) }))
        }
        "activity:unsubscribe" => {
            let tags = string_list(payload, "tags")?;
            for tag in &tags {
                state.pubsub.unsubscribe(
                    &topics::fleet_tag(&session.ctx.fleet_id, tag),
                    session.subscriber,
                );
                session.tags.remove(tag);
            }
            Ok(json!({ "subscribed_tags": sorted(&session.tags) }))
        }
        "activity:history" => {
            let request = history_request(payload)?;
            let events = state
                .router
                .activity_history(&session.ctx.fleet_id, &request)
                .await?;
            Ok(json!({ "count": events.len(), "events": events }))
        }
        "direct:send" => {
            let to = required_str(payload, "to")?;
            let message = payload.get("message").cloned().unwrap_or(Value::Null);
            let correlation_id = payload
                .get("correlation_id")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            let (message_id, status) = state
                .router
                .send_direct(&session.ctx, &to, message, correlation_id)
                .await?;
            state.metrics.messages_routed.with_label_values(&["direct"]).inc();
            Ok(json!({ "message_id": message_id, "status": status }))
        }
        "direct:history" => {
            let with = required_str(payload, "with")?;
            let limit = payload
                .get("limit")
                .and_then(Value::as_u64)
                .map_or(100, |n| n as usize);
            let messages = state
                .router
                .direct_history(
                    &session.ctx.fleet_id,
                    session.ctx.agent_id.as_str(),
                    &with,
                    limit,
                )
                .await?;
            Ok(json!({ "count": messages.len(), "messages": messages }))
        }
        "memory:set" => {
            let key = required_str(payload, "key")?;
            let value = payload.get("value").cloned().unwrap_or(Value::Null);
            state.router.memory_set(&session.ctx, &key, &value).await?;
            Ok(json!({ "status": "ok", "key": key }))
        }
        "memory:get" => {
            let key = required_str(payload, "key")?;
            let value = state.router.memory_get(&session.ctx.fleet_id, &key).await?;
            Ok(json!({ "key": key, "value": value }))
        }
        "memory:delete" => {
            let key = required_str(payload, "key")?;
            let deleted = state.router.memory_delete(&session.ctx, &key).await?;
            Ok(json!({ "key": key, "deleted": deleted }))
        }
        "task:submit" => {
            let submission = TaskSubmission {
                task_type: payload
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("generic")
                    .to_owned(),
                prompt: payload
                    .get("prompt")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                capabilities_required: payload
                    .get("capabilities_required")
                    .and_then(Value::as_array)
                    .map(|caps| {
                        caps.iter()
                            .filter_map(Value::as_str)
                            .map(ToOwned::to_owned)
                            .collect::<BTreeSet<_>>()
                    })
                    .unwrap_or_default(),
                priority: parse_priority(payload),
                ttl_ms: payload.get("ttl_ms").and_then(Value::as_u64),
                correlation_id: payload
                    .get("correlation_id")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
            };
            let task = state
                .scheduler
                .submit(session.ctx.fleet_id, &session.ctx.agent_id, submission);
            state.metrics.task_transitions.with_label_values(&["pending"]).inc();
            Ok(json!({ "task_id": task.task_id }))
        }
        "task:start" => {
            let task_id = task_id(payload)?;
            let task = state
                .scheduler
                .mark_running(&session.ctx.agent_id, &task_id)?;
            state.metrics.task_transitions.with_label_values(&["running"]).inc();
            Ok(json!({ "task_id": task.task_id, "status": task.status }))
        }
        "task:result" => {
            let task_id = task_id(payload)?;
            let result = payload.get("result").cloned();
            let error = payload
                .get("error")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            let task = state.scheduler.ingest_result(
                &session.ctx.agent_id,
                &task_id,
                result,
                error,
            )?;
            let status = task.status.to_string();
            state
                .metrics
                .task_transitions
                .with_label_values(&[status.as_str()])
                .inc();
            Ok(json!({ "task_id": task.task_id, "status": task.status }))
        }
        other => Err(HubError::InvalidPayload(format!("unknown action {other}"))),
    }
}

fn required_str(payload: &Value, field: &str) -> HubResult<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| HubError::InvalidPayload(format!("{field} is required")))
}

fn string_list(payload: &Value, field: &str) -> HubResult<Vec<String>> {
    payload
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .ok_or_else(|| HubError::InvalidPayload(format!("{field} must be a string list")))
}

fn sorted(tags: &HashSet<String>) -> Vec<String> {
    let mut out: Vec<String> = tags.iter().cloned().collect();
    out.sort();
    out
}

fn task_id(payload: &Value) -> HubResult<TaskId> {
    let raw = required_str(payload, "task_id")?;
    serde_json::from_value(Value::String(raw))
        .map_err(|e| HubError::InvalidPayload(e.to_string()))
}

fn parse_priority(payload: &Value) -> TaskPriority {
    match payload.get("priority").and_then(Value::as_str) {
        Some("low") => TaskPriority::Low,
        Some("high") => TaskPriority::High,
        _ => TaskPriority::Normal,
    }
}

fn history_request(payload: &Value) -> HubResult<HistoryRequest> {
    let parse_ts = |field: &str| -> HubResult<Option<DateTime<Utc>>> {
        match payload.get(field).and_then(Value::as_str) {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|_| HubError::InvalidPayload(format!("{field} must be RFC 3339"))),
        }
    };
    let string_set = |field: &str| -> Option<BTreeSet<String>> {
        payload.get(field).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
    };

    Ok(HistoryRequest {
        limit: payload
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| n as usize),
        kinds: string_set("kinds"),
        from: parse_ts("from")?,
        to: parse_ts("to")?,
        agents: string_set("agents"),
        tags: string_set("tags"),
    })
}
