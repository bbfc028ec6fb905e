//! The JSON envelope spoken on the WebSocket.
//!
//! Client frames carry an action in `action` (or implicitly in `type`).
//! Server frames are either pushes (`type: "event"`), successful replies
//! (`type: "result"`), or inline errors (`type: "error"`). Replies echo the
//! caller's `correlation_id` inside `payload`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HubError;

/// A client-originated frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    /// Frame type; doubles as the action when `action` is absent.
    #[serde(rename = "type")]
    pub frame_type: String,
    /// Explicit action string.
    #[serde(default)]
    pub action: Option<String>,
    /// Action payload.
    #[serde(default)]
    pub payload: Value,
}

impl ClientFrame {
    /// The effective action: `action` when present, else `type`.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_deref().unwrap_or(&self.frame_type)
    }

    /// The caller's correlation ID, when supplied.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.payload.get("correlation_id").and_then(Value::as_str)
    }
}

/// A server-originated frame.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    /// `"event"`, `"result"` or `"error"`.
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    /// Event name on pushes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Echoed action on replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Frame payload.
    pub payload: Value,
}

impl ServerFrame {
    /// A server push.
    #[must_use]
    pub fn event(event: impl Into<String>, payload: Value) -> Self {
        Self {
            frame_type: "event",
            event: Some(event.into()),
            action: None,
            payload,
        }
    }

    /// A successful reply to a client action, echoing any correlation ID.
    #[must_use]
    pub fn result(action: &str, mut payload: Value, correlation_id: Option<&str>) -> Self {
        if let Some(cid) = correlation_id {
            if let Value::Object(map) = &mut payload {
                map.insert("correlation_id".into(), Value::String(cid.to_owned()));
            }
        }
        Self {
            frame_type: "result",
            event: None,
            action: Some(action.to_owned()),
            payload,
        }
    }

    /// An inline error reply.
    #[must_use]
    pub fn error(action: &str, err: &HubError, correlation_id: Option<&str>) -> Self {
        let mut map = Map::new();
        map.insert("reason".into(), Value::String(err.reason().to_owned()));
        map.insert("message".into(), Value::String(err.to_string()));
        if let Some(cid) = correlation_id {
            map.insert("correlation_id".into(), Value::String(cid.to_owned()));
        }
        Self {
            frame_type: "error",
            event: None,
            action: Some(action.to_owned()),
            payload: Value::Object(map),
        }
    }

    /// Serialize for the socket.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"type\":\"error\"}".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_falls_back_to_type() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "presence:update", "payload": {}})).unwrap();
        assert_eq!(frame.action(), "presence:update");

        let frame: ClientFrame = serde_json::from_value(
            json!({"type": "action", "action": "direct:send", "payload": {}}),
        )
        .unwrap();
        assert_eq!(frame.action(), "direct:send");
    }

    #[test]
    fn test_result_echoes_correlation_id() {
        let frame = ServerFrame::result("task:submit", json!({"task_id": "task_x"}), Some("c-1"));
        let v: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(v["type"], "result");
        assert_eq!(v["action"], "task:submit");
        assert_eq!(v["payload"]["correlation_id"], "c-1");
    }

    #[test]
    fn test_error_frame_carries_reason() {
        let frame = ServerFrame::error("activity:broadcast", &HubError::InvalidKind("x".into()), None);
        let v: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["payload"]["reason"], "invalid_kind");
    }

    #[test]
    fn test_event_frame_shape() {
        let frame = ServerFrame::event("presence:joined", json!({"agent_id": "ag_x"}));
        let v: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(v["type"], "event");
        assert_eq!(v["event"], "presence:joined");
        assert!(v.get("action").is_none());
    }
}
