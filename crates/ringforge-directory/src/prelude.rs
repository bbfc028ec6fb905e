//! Convenient re-exports.

pub use crate::challenge::ChallengeStore;
pub use crate::directory::{AgentDirectory, RegisterMeta};
pub use crate::stores::{DirectoryStore, MemoryDirectoryStore};
