//! The per-session socket loop.
//!
//! Each session owns its outbound writer task; everything the server pushes
//! (presence diffs, activity, direct messages, task assignments) arrives on
//! the session's pub/sub queue, and replies to the session's own actions go
//! down the same writer through a reply channel. On socket death the
//! session's subscriptions are dropped, so late completions have nowhere to
//! write.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use ringforge_audit::{AuditAction, AuditEntry, AuditOutcome};
use ringforge_core::{topics, AgentRecord, ClientFrame, PresenceEntry, ServerFrame, SessionId};
use ringforge_router::SenderContext;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dispatch::{handle_frame, SessionState};
use crate::ratelimit::TokenBucket;
use crate::state::HubState;

/// Drive one authenticated socket until it closes.
pub(crate) async fn run(state: Arc<HubState>, socket: WebSocket, agent: AgentRecord) {
    let session_id = SessionId::new();
    let fleet_id = agent.fleet_id;
    let ctx = SenderContext {
        fleet_id,
        agent_id: agent.agent_id.clone(),
        name: agent.display_name().map(ToOwned::to_owned),
    };

    state.metrics.connections_total.inc();
    state.metrics.connections_active.inc();

    // Register the session's private queue, then attach it to its topics
    // before anything is pushed.
    let (subscriber, mut pubsub_rx) = state.pubsub.register();
    state.pubsub.subscribe(&topics::fleet(&fleet_id), subscriber);
    state.pubsub.subscribe(
        &topics::fleet_agent(&fleet_id, ctx.agent_id.as_str()),
        subscriber,
    );

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerFrame>();
    let (mut sink, mut stream) = socket.split();

    // Writer task: the only place that touches the socket sink.
    let writer = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                Some(frame) = reply_rx.recv() => frame.to_json(),
                Some(frame) = pubsub_rx.recv() => frame.to_json(),
                else => break,
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Join: enter the roster, push it (including ourselves), drain the
    // offline queue.
    state.presence.track(
        fleet_id,
        PresenceEntry::joined(
            session_id,
            ctx.agent_id.clone(),
            ctx.name.clone(),
            agent.framework.clone(),
            agent.capabilities.clone(),
        ),
    );
    let _ = reply_tx.send(ServerFrame::event(
        "presence:roster",
        state.router.roster_payload(&fleet_id),
    ));
    let flushed = state.router.flush_offline_queue(fleet_id, &ctx.agent_id).await;
    if flushed > 0 {
        debug!(agent = %ctx.agent_id, flushed, "offline queue drained");
    }

    let mut session = SessionState {
        ctx: ctx.clone(),
        session_id,
        subscriber,
        tags: HashSet::new(),
        bucket: TokenBucket::new(
            state.config.session_actions_per_second,
            state.config.session_actions_burst,
        ),
    };

    // Read loop: dispatch inbound frames until the socket closes.
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
                    warn!(agent = %ctx.agent_id, "undecodable frame dropped");
                    continue;
                };
                let reply = handle_frame(&state, &mut session, &frame).await;
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // Termination hook: depart the roster, detach the queue, touch the row.
    state.presence.untrack(fleet_id, session_id);
    state.pubsub.deregister(subscriber);
    drop(reply_tx);
    writer.abort();
    state.metrics.connections_active.dec();
    if let Err(e) = state.directory.touch(&ctx.agent_id).await {
        warn!(error = %e, agent = %ctx.agent_id, "touch on close failed");
    }
    state.audit.record(AuditEntry::new(
        Some(fleet_id),
        Some(ctx.agent_id.clone()),
        AuditAction::SessionClosed,
        AuditOutcome::Success,
        json!({ "session_id": session_id }),
    ));
    debug!(agent = %ctx.agent_id, session = %session_id, "session closed");
}
