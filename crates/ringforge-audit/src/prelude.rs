//! Convenient re-exports.

pub use crate::entry::{AuditAction, AuditEntry, AuditOutcome};
pub use crate::sink::AuditSink;
pub use crate::storage::{AuditStorage, MemoryAuditStorage};
