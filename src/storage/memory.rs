//! In-Memory Store Module
//!
//! HashMap-backed durable store with an optional byte quota. Used as the
//! default embedded medium and for simulating quota exhaustion in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::storage::DurableStore;

// == Memory Store ==
/// In-memory [`DurableStore`] backend.
///
/// When a quota is set, a `save` that would push the total stored byte
/// count past it fails with [`StorageError::QuotaExceeded`], mirroring how
/// a real bounded medium behaves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    quota: RwLock<Option<u64>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an unbounded in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an in-memory store that rejects writes past `quota_bytes`.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota: RwLock::new(Some(quota_bytes)),
        }
    }

    // == Quota ==
    /// Changes the quota at runtime. `None` lifts the limit.
    pub async fn set_quota(&self, quota_bytes: Option<u64>) {
        *self.quota.write().await = quota_bytes;
    }

    // == Total Bytes ==
    /// Total byte count currently stored across all keys.
    pub async fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .await
            .values()
            .map(|v| v.len() as u64)
            .sum()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        if let Some(quota) = *self.quota.read().await {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len() as u64)
                .sum();
            if others + value.len() as u64 > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryStore::new();
        store.save("a", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.load("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemoryStore::new();
        store.save("a", vec![1]).await.unwrap();
        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_keys_filters_by_prefix() {
        let store = MemoryStore::new();
        store.save("cache-a", vec![1]).await.unwrap();
        store.save("cache-b", vec![2]).await.unwrap();
        store.save("other", vec![3]).await.unwrap();

        let mut keys = store.list_keys("cache-").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["cache-a", "cache-b"]);
    }

    #[tokio::test]
    async fn test_quota_rejects_oversized_save() {
        let store = MemoryStore::with_quota(10);
        store.save("a", vec![0; 8]).await.unwrap();

        let result = store.save("b", vec![0; 8]).await;
        assert!(matches!(result, Err(StorageError::QuotaExceeded)));

        // Replacing an existing key only counts the delta
        store.save("a", vec![0; 10]).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_quota_lifts_limit() {
        let store = MemoryStore::with_quota(4);
        assert!(store.save("a", vec![0; 8]).await.is_err());
        store.set_quota(None).await;
        store.save("a", vec![0; 8]).await.unwrap();
        assert_eq!(store.total_bytes().await, 8);
    }
}
