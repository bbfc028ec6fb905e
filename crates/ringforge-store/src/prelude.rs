//! Convenient re-exports.

pub use crate::error::{StoreError, StoreResult};
pub use crate::memory::MemoryDocumentStore;
pub use crate::remote::{serve, RemoteDocumentStore};
pub use crate::store::{Document, DocumentStore};
