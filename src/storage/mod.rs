//! Storage Module
//!
//! Abstraction over the durable byte store that namespace blobs are
//! persisted to, plus the built-in backends.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StorageError;

// == Durable Store Trait ==
/// A simple durable key/value byte store.
///
/// One key holds the entire serialized blob of one cache namespace; the
/// blob is the unit of durability and atomicity. Implementations must
/// report quota exhaustion as [`StorageError::QuotaExceeded`] so the cache
/// layer can run its recovery path.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Returns the stored bytes for `key`, or `None` if absent.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every stored key starting with `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
