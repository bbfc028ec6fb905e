//! RingForge Core - Foundation types for the RingForge coordination hub.
//!
//! This crate provides:
//! - Identifier newtypes for tenants, fleets, agents, sessions, tasks and messages
//! - Durable records (agents, API keys) and ephemeral state (presence, tasks)
//! - The direct-message envelope and the socket wire envelope
//! - Topic naming for the pub/sub substrate and the event bus
//! - The shared error taxonomy crossing component boundaries

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod agent;
mod envelope;
mod error;
mod event;
mod ids;
mod presence;
mod task;
pub mod topics;
mod wire;

pub use agent::{AgentRecord, ApiKeyKind, ApiKeyRecord, FleetRecord};
pub use envelope::{DirectEnvelope, EnvelopeSender, MessagePriority};
pub use error::{HubError, HubResult};
pub use event::BusEvent;
pub use ids::{AgentId, FleetId, MessageId, SessionId, TaskId, TenantId};
pub use presence::{PresenceEntry, PresenceState};
pub use task::{Task, TaskPriority, TaskStatus, DEFAULT_TASK_TTL_MS, MAX_TASK_TTL_MS};
pub use topics::EventKind;
pub use wire::{ClientFrame, ServerFrame};
