//! The document store contract.

use async_trait::async_trait;

use crate::error::StoreResult;

/// One stored document: opaque metadata and body bytes under a string key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Document key.
    pub key: String,
    /// Metadata bytes.
    pub meta: Vec<u8>,
    /// Body bytes.
    pub body: Vec<u8>,
}

/// An opaque key → (meta, body) document store.
///
/// Writes replace. Reads of absent keys return `None` rather than an error;
/// errors are reserved for transport and store failures.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a document, replacing any previous content under the key.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] on transport or store failure.
    async fn put_document(&self, key: &str, meta: &[u8], body: &[u8]) -> StoreResult<()>;

    /// Fetch a document.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] on transport or store failure.
    async fn get_document(&self, key: &str) -> StoreResult<Option<Document>>;

    /// Delete a document. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] on transport or store failure.
    async fn delete_document(&self, key: &str) -> StoreResult<bool>;

    /// List every stored key.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] on transport or store failure.
    async fn list_documents(&self) -> StoreResult<Vec<String>>;
}
