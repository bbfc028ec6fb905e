//! Convenient re-exports for downstream crates.

pub use crate::agent::{AgentRecord, ApiKeyKind, ApiKeyRecord, FleetRecord};
pub use crate::envelope::{DirectEnvelope, EnvelopeSender, MessagePriority};
pub use crate::error::{HubError, HubResult};
pub use crate::event::BusEvent;
pub use crate::ids::{AgentId, FleetId, MessageId, SessionId, TaskId, TenantId};
pub use crate::presence::{PresenceEntry, PresenceState};
pub use crate::task::{Task, TaskPriority, TaskStatus};
pub use crate::topics::EventKind;
pub use crate::wire::{ClientFrame, ServerFrame};
