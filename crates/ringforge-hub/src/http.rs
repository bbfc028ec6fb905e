//! HTTP surface: the WebSocket upgrade and the collaborator endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ringforge_audit::{AuditAction, AuditEntry, AuditOutcome};
use ringforge_core::AgentId;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::auth::{authenticate, ConnectRequest};
use crate::session;
use crate::state::HubState;

/// Build the axum application.
pub(crate) fn app(state: Arc<HubState>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/auth/challenge", post(issue_challenge))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_upgrade(
    State(state): State<Arc<HubState>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let request = match ConnectRequest::from_params(&params) {
        Ok(request) => request,
        Err(_) => {
            // Unrecognized shape: 401 with no body, no hint.
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };
    match authenticate(&state, request).await {
        Ok((agent, method)) => {
            debug!(agent_id = %agent.agent_id, method, "upgrading session");
            ws.on_upgrade(move |socket| session::run(state, socket, agent))
        }
        Err(_) => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ChallengeBody {
    agent_id: String,
}

async fn issue_challenge(
    State(state): State<Arc<HubState>>,
    Json(body): Json<ChallengeBody>,
) -> Response {
    let Ok(agent_id) = AgentId::parse(&body.agent_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_agent_id" })),
        )
            .into_response();
    };
    let agent = match state.directory.store().get_agent(&agent_id).await {
        Ok(Some(agent)) => agent,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "not_found" })),
            )
                .into_response();
        }
        Err(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "unavailable" })),
            )
                .into_response();
        }
    };

    let challenge = state.directory.challenges().issue(&agent_id);
    state.audit.record(AuditEntry::new(
        Some(agent.fleet_id),
        Some(agent_id),
        AuditAction::ChallengeIssued,
        AuditOutcome::Success,
        json!({}),
    ));
    Json(json!({ "challenge": challenge })).into_response()
}

async fn health(State(state): State<Arc<HubState>>) -> Response {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "active_connections": state.metrics.connections_active.get(),
        "tasks": state.scheduler.store().len(),
    }))
    .into_response()
}

async fn metrics(State(state): State<Arc<HubState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
