//! Cache Registry Module
//!
//! Process-wide registry of named cache stores. Constructed explicitly and
//! passed by handle so tests can build isolated registries; there is no
//! ambient global.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheStore, EntryMap, STORAGE_KEY_PREFIX};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::storage::DurableStore;
use crate::tasks::spawn_cleanup_task;

// == Global Stats ==
/// Aggregate statistics across every persisted namespace.
///
/// Entry and size totals come from scanning storage directly, so they
/// cover namespaces never instantiated in this process; the hit rate can
/// only be averaged over stores that are live right now.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GlobalStats {
    /// Number of persisted namespace blobs
    pub namespaces: usize,
    /// Total entries across all persisted namespaces
    pub entries: usize,
    /// Total stored payload bytes across all persisted namespaces
    pub total_size_bytes: u64,
    /// Mean hit rate of the currently instantiated stores
    pub average_hit_rate: f64,
}

// == Cache Registry ==
/// Registry of named [`CacheStore`] instances sharing one durable medium.
///
/// Instances are created lazily on first lookup and live until
/// [`CacheRegistry::dispose_all`] (or drop). The registry is the sole
/// owner of instance lifecycles and their cleanup tasks.
pub struct CacheRegistry {
    storage: Arc<dyn DurableStore>,
    config: CacheConfig,
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    stores: HashMap<String, Arc<CacheStore>>,
    cleanup_tasks: HashMap<String, JoinHandle<()>>,
}

impl CacheRegistry {
    // == Constructor ==
    /// Creates a registry over the given storage medium and defaults.
    pub fn new(storage: Arc<dyn DurableStore>, config: CacheConfig) -> Self {
        Self {
            storage,
            config,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    // == Get Instance ==
    /// Returns the store for `namespace`, constructing it lazily.
    ///
    /// Must be called from within a Tokio runtime: each new instance gets
    /// a background cleanup task.
    pub fn get_instance(&self, namespace: &str) -> Arc<CacheStore> {
        self.instance(namespace, None)
    }

    /// Like [`CacheRegistry::get_instance`] with an explicit size cap.
    ///
    /// The cap only applies when this call constructs the instance: the
    /// first call wins, and later calls with a different `max_size_bytes`
    /// do not resize an already-constructed store. This is a documented
    /// limitation of the registry.
    pub fn get_instance_with_max_size(
        &self,
        namespace: &str,
        max_size_bytes: u64,
    ) -> Arc<CacheStore> {
        self.instance(namespace, Some(max_size_bytes))
    }

    fn instance(&self, namespace: &str, max_size_bytes: Option<u64>) -> Arc<CacheStore> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");

        if let Some(existing) = inner.stores.get(namespace) {
            return existing.clone();
        }

        let store = Arc::new(match max_size_bytes {
            Some(max) => CacheStore::with_max_size(
                namespace,
                self.storage.clone(),
                self.config.clone(),
                max,
            ),
            None => CacheStore::new(namespace, self.storage.clone(), self.config.clone()),
        });
        let handle = spawn_cleanup_task(
            store.clone(),
            Duration::from_millis(self.config.cleanup_interval_ms),
        );

        debug!(namespace, "constructed cache store instance");
        inner.stores.insert(namespace.to_string(), store.clone());
        inner.cleanup_tasks.insert(namespace.to_string(), handle);
        store
    }

    // == Clear All ==
    /// Removes every persisted namespace blob under the cache prefix,
    /// including namespaces never instantiated in this process, then
    /// disposes all live instances.
    pub async fn clear_all(&self) -> Result<()> {
        let keys = self.storage.list_keys(&blob_prefix()).await?;
        for key in &keys {
            self.storage.remove(key).await?;
        }
        info!(removed = keys.len(), "cleared all cache namespaces");
        self.dispose_all();
        Ok(())
    }

    // == Global Stats ==
    /// Aggregates statistics across every persisted namespace blob.
    pub async fn global_stats(&self) -> Result<GlobalStats> {
        let keys = self.storage.list_keys(&blob_prefix()).await?;
        let mut stats = GlobalStats {
            namespaces: keys.len(),
            ..GlobalStats::default()
        };

        for key in &keys {
            let Some(bytes) = self.storage.load(key).await? else {
                continue;
            };
            match serde_json::from_slice::<EntryMap>(&bytes) {
                Ok(map) => {
                    stats.entries += map.len();
                    stats.total_size_bytes +=
                        map.values().map(|entry| entry.size_bytes).sum::<u64>();
                }
                Err(err) => {
                    debug!(key = %key, %err, "skipping malformed namespace blob in global stats");
                }
            }
        }

        let stores: Vec<Arc<CacheStore>> = {
            let inner = self.inner.lock().expect("registry lock poisoned");
            inner.stores.values().cloned().collect()
        };
        if !stores.is_empty() {
            let mut sum = 0.0;
            for store in &stores {
                sum += store.stats().await.hit_rate();
            }
            stats.average_hit_rate = sum / stores.len() as f64;
        }

        Ok(stats)
    }

    // == Dispose All ==
    /// Stops every instance's cleanup task and drops the instance map.
    /// Persisted data is untouched.
    pub fn dispose_all(&self) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        for (namespace, handle) in inner.cleanup_tasks.drain() {
            handle.abort();
            debug!(namespace = %namespace, "stopped cleanup task");
        }
        let dropped = inner.stores.len();
        inner.stores.clear();
        if dropped > 0 {
            info!(dropped, "disposed cache store instances");
        }
    }
}

impl Drop for CacheRegistry {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

/// Prefix shared by every namespace blob key.
fn blob_prefix() -> String {
    format!("{STORAGE_KEY_PREFIX}-")
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn registry() -> (Arc<MemoryStore>, CacheRegistry) {
        let storage = Arc::new(MemoryStore::new());
        let registry = CacheRegistry::new(storage.clone(), CacheConfig::default());
        (storage, registry)
    }

    #[tokio::test]
    async fn test_get_instance_returns_same_store() {
        let (_storage, registry) = registry();
        let a = registry.get_instance("thumbnails");
        let b = registry.get_instance("thumbnails");
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.get_instance("listings");
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn test_first_construction_wins_on_max_size() {
        let (_storage, registry) = registry();
        let first = registry.get_instance_with_max_size("ns", 1_000);
        let second = registry.get_instance_with_max_size("ns", 9_999);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.max_size_bytes(), 1_000);
    }

    #[tokio::test]
    async fn test_clear_all_removes_uninstantiated_namespaces() {
        let (storage, registry) = registry();

        // A namespace written by some earlier process, never touched here
        let orphan = CacheStore::new("orphan", storage.clone(), CacheConfig::default());
        orphan.set("k", &1u32, None).await.unwrap();

        let live = registry.get_instance("live");
        live.set("k", &2u32, None).await.unwrap();

        registry.clear_all().await.unwrap();

        assert!(storage.list_keys("nscache-").await.unwrap().is_empty());
        // Instances were dropped too; a new lookup builds a fresh store
        let fresh = registry.get_instance("live");
        assert!(!Arc::ptr_eq(&live, &fresh));
    }

    #[tokio::test]
    async fn test_global_stats_scans_storage_directly() {
        let (storage, registry) = registry();

        let a = registry.get_instance("a");
        a.set("k1", &"v1", None).await.unwrap();
        a.set("k2", &"v2", None).await.unwrap();
        a.get::<String>("k1").await.unwrap();

        // Never instantiated through the registry, still counted
        let external = CacheStore::new("external", storage, CacheConfig::default());
        external.set("k", &"v", None).await.unwrap();

        let stats = registry.global_stats().await.unwrap();
        assert_eq!(stats.namespaces, 2);
        assert_eq!(stats.entries, 3);
        assert!(stats.total_size_bytes > 0);
        // Only the instantiated store contributes a hit-rate sample
        assert_eq!(stats.average_hit_rate, 1.0);
    }

    #[tokio::test]
    async fn test_global_stats_skips_malformed_blob() {
        let (storage, registry) = registry();
        storage
            .save("nscache-broken", b"garbage".to_vec())
            .await
            .unwrap();

        let good = registry.get_instance("good");
        good.set("k", &1u32, None).await.unwrap();

        let stats = registry.global_stats().await.unwrap();
        assert_eq!(stats.namespaces, 2);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_dispose_all_keeps_persisted_data() {
        let (_storage, registry) = registry();
        let store = registry.get_instance("ns");
        store.set("k", &41u32, None).await.unwrap();

        registry.dispose_all();

        let reopened = registry.get_instance("ns");
        assert_eq!(reopened.get::<u32>("k").await.unwrap().data, 41);
    }
}
