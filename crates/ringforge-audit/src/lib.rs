//! RingForge Audit - Security audit trail for the RingForge hub.
//!
//! Every security-sensitive action is recorded as an [`AuditEntry`]:
//! appended to the `audit_logs` storage backend and published on the
//! `{fleet|"system"}.audit` bus topic. Recording is fire-and-forget — a
//! caller never observes audit failures, they are logged and dropped.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod entry;
mod error;
mod sink;
mod storage;

pub use entry::{AuditAction, AuditEntry, AuditOutcome};
pub use error::{AuditError, AuditResult};
pub use sink::AuditSink;
pub use storage::{AuditStorage, MemoryAuditStorage};
