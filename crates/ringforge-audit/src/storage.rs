//! Audit log storage trait and the in-memory implementation.

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Storage backend for the `audit_logs` table.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] when the entry cannot be persisted.
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// Fetch an entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] on retrieval failure.
    async fn get(&self, id: &Uuid) -> AuditResult<Option<AuditEntry>>;

    /// Total entry count.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] on retrieval failure.
    async fn count(&self) -> AuditResult<usize>;
}

/// In-memory storage, used in tests and single-node deployments.
#[derive(Default)]
pub struct MemoryAuditStorage {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every stored entry, in insertion order.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditStorage for MemoryAuditStorage {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> AuditResult<Option<AuditEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .find(|e| &e.id == id)
            .cloned())
    }

    async fn count(&self) -> AuditResult<usize> {
        Ok(self.entries.lock().await.len())
    }
}

/// Storage that fails every append; test double for sink error paths.
#[cfg(test)]
pub(crate) struct FailingAuditStorage;

#[cfg(test)]
#[async_trait]
impl AuditStorage for FailingAuditStorage {
    async fn append(&self, _entry: &AuditEntry) -> AuditResult<()> {
        Err(AuditError::Storage("backend down".to_owned()))
    }

    async fn get(&self, _id: &Uuid) -> AuditResult<Option<AuditEntry>> {
        Err(AuditError::Storage("backend down".to_owned()))
    }

    async fn count(&self) -> AuditResult<usize> {
        Err(AuditError::Storage("backend down".to_owned()))
    }
}
