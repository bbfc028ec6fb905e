//! RingForge Hub - The WebSocket gateway daemon.
//!
//! Accepts agent connections on a single WebSocket path, authenticates them
//! against the directory (registration, key reconnect, or Ed25519 challenge
//! reconnect), attaches per-session state, and dispatches inbound frames to
//! the presence registry, message router and task scheduler. HTTP
//! collaborators: `POST /auth/challenge`, `GET /health`, `GET /metrics`.
//!
//! # Locking design
//!
//! No component writes a socket directly. Each session owns its outbound
//! writer task fed by one queue; presence diffs, activity, direct messages
//! and task pushes all arrive through pub/sub topics the session subscribes
//! to. Shared maps are only locked for brief insert/remove/lookup.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod auth;
mod dispatch;
mod http;
mod ratelimit;
mod server;
mod session;
mod state;

pub use auth::ConnectRequest;
pub use server::{run, Hub};
pub use state::HubState;
