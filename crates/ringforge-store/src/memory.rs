//! In-memory document store.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreResult;
use crate::store::{Document, DocumentStore};

/// In-memory reference implementation, used in tests and single-node
/// deployments without an external store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: DashMap<String, (Vec<u8>, Vec<u8>)>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put_document(&self, key: &str, meta: &[u8], body: &[u8]) -> StoreResult<()> {
        self.docs
            .insert(key.to_owned(), (meta.to_vec(), body.to_vec()));
        Ok(())
    }

    async fn get_document(&self, key: &str) -> StoreResult<Option<Document>> {
        Ok(self.docs.get(key).map(|entry| Document {
            key: key.to_owned(),
            meta: entry.0.clone(),
            body: entry.1.clone(),
        }))
    }

    async fn delete_document(&self, key: &str) -> StoreResult<bool> {
        Ok(self.docs.remove(key).is_some())
    }

    async fn list_documents(&self) -> StoreResult<Vec<String>> {
        Ok(self.docs.iter().map(|entry| entry.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryDocumentStore::new();
        store.put_document("k1", b"meta", b"body").await.unwrap();

        let doc = store.get_document("k1").await.unwrap().unwrap();
        assert_eq!(doc.meta, b"meta");
        assert_eq!(doc.body, b"body");

        assert!(store.delete_document("k1").await.unwrap());
        assert!(store.get_document("k1").await.unwrap().is_none());
        assert!(!store.delete_document("k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = MemoryDocumentStore::new();
        store.put_document("k", b"a", b"1").await.unwrap();
        store.put_document("k", b"b", b"2").await.unwrap();
        let doc = store.get_document("k").await.unwrap().unwrap();
        assert_eq!(doc.body, b"2");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_keys() {
        let store = MemoryDocumentStore::new();
        store.put_document("dmq:f:a:1", b"", b"x").await.unwrap();
        store.put_document("mem:f:k", b"", b"y").await.unwrap();
        let mut keys = store.list_documents().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["dmq:f:a:1", "mem:f:k"]);
    }
}
