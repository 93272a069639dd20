//! Cache Store Module
//!
//! Durable, bounded, self-cleaning key-value cache for one namespace.
//! Every operation is a load-mutate-save of the whole namespace blob,
//! serialized by a per-namespace lock so no update is lost.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::stats::StatsCounters;
use crate::cache::{eviction, storage_key, CacheEntry, CacheStats, EntryMap};
use crate::codec::{Payload, SerializationCodec};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result, StorageError};
use crate::storage::DurableStore;

// == Cache Store ==
/// Namespaced cache backed by a durable byte store.
pub struct CacheStore {
    /// Namespace name
    namespace: String,
    /// Storage key of this namespace's blob
    storage_key: String,
    /// Durable medium the blob is persisted to
    storage: Arc<dyn DurableStore>,
    /// Payload codec
    codec: SerializationCodec,
    /// Cache configuration
    config: CacheConfig,
    /// Hard size cap for this namespace's payload bytes
    max_size_bytes: u64,
    /// Per-namespace lock guarding every load-mutate-save sequence, and
    /// the process-lifetime counters living under it
    state: Mutex<StatsCounters>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store for `namespace` using the configured size cap.
    pub fn new(
        namespace: impl Into<String>,
        storage: Arc<dyn DurableStore>,
        config: CacheConfig,
    ) -> Self {
        let max_size_bytes = config.max_namespace_size_bytes;
        Self::with_max_size(namespace, storage, config, max_size_bytes)
    }

    /// Creates a store with an explicit size cap overriding the configured one.
    pub fn with_max_size(
        namespace: impl Into<String>,
        storage: Arc<dyn DurableStore>,
        config: CacheConfig,
        max_size_bytes: u64,
    ) -> Self {
        let namespace = namespace.into();
        Self {
            storage_key: storage_key(&namespace),
            codec: SerializationCodec::from_config(&config),
            namespace,
            storage,
            config,
            max_size_bytes,
            state: Mutex::new(StatsCounters::default()),
        }
    }

    // == Accessors ==
    /// Namespace this store manages.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Hard payload size cap of this namespace.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    // == Set ==
    /// Stores a value under `key` with optional TTL.
    ///
    /// If the key already exists, the entry is replaced and its TTL reset.
    /// If the namespace exceeds its size cap afterwards, entries are
    /// evicted by score until it fits with headroom. A quota rejection
    /// from the storage layer triggers recovery and one retry; only an
    /// unrecoverable quota failure surfaces as [`CacheError::StorageFull`].
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let payload = self.codec.encode(value)?;
        let now = current_timestamp_ms();
        let ttl_ms = ttl
            .map(|d| d.as_millis() as u64)
            .unwrap_or(self.config.default_ttl_ms);
        let entry = CacheEntry::new(payload, now, ttl_ms, self.config.schema_version.clone());

        let mut state = self.state.lock().await;
        let mut map = self.load_map().await;
        map.insert(key.to_string(), entry.clone());

        if eviction::total_size(&map) > self.max_size_bytes {
            let target = (self.max_size_bytes as f64 * self.config.eviction_headroom) as u64;
            let victims = eviction::plan_size_eviction(&map, now, target);
            debug!(
                namespace = %self.namespace,
                evicted = victims.len(),
                "evicting entries to fit size cap"
            );
            for victim in &victims {
                map.remove(victim);
            }
            state.record_evictions(victims.len());
        }

        match self.persist(&map).await {
            Ok(()) => Ok(()),
            Err(StorageError::QuotaExceeded) => {
                self.recover_quota(&mut state, key, entry, now).await
            }
            Err(err) => Err(err.into()),
        }
    }

    // == Get ==
    /// Retrieves the entry under `key`, decoded as `T`.
    ///
    /// Absent, expired, stale-versioned, and undecodable entries all
    /// count as misses and return `None`; the last three are purged on
    /// observation. A successful read bumps the entry's access stats and
    /// persists them, so eviction ordering survives process restarts.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let now = current_timestamp_ms();
        let mut state = self.state.lock().await;
        let mut map = self.load_map().await;

        let live = match map.get(key) {
            Some(entry) => entry.is_live(&self.config.schema_version, now),
            None => {
                state.record_miss();
                return None;
            }
        };
        if !live {
            map.remove(key);
            self.persist_best_effort(&map).await;
            state.record_miss();
            return None;
        }

        let decoded: Option<T> = map
            .get(key)
            .and_then(|entry| match self.codec.decode(&entry.data) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(
                        namespace = %self.namespace,
                        key,
                        %err,
                        "purging undecodable cache entry"
                    );
                    None
                }
            });
        let Some(decoded) = decoded else {
            map.remove(key);
            self.persist_best_effort(&map).await;
            state.record_miss();
            return None;
        };

        let hit = match map.get_mut(key) {
            Some(entry) => {
                entry.touch(now);
                entry.with_data(decoded)
            }
            None => {
                state.record_miss();
                return None;
            }
        };
        self.persist_best_effort(&map).await;
        state.record_hit();
        Some(hit)
    }

    // == Delete ==
    /// Removes the entry under `key`. Deleting an absent key is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let _state = self.state.lock().await;
        let mut map = self.load_map().await;
        if map.remove(key).is_some() {
            self.persist(&map).await?;
        }
        Ok(())
    }

    // == Clear ==
    /// Drops the entire namespace blob and resets the hit/miss counters.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.storage.remove(&self.storage_key).await?;
        state.reset();
        Ok(())
    }

    // == Stats ==
    /// Returns a snapshot of this namespace's statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let map = self.load_map().await;
        CacheStats {
            entries: map.len(),
            total_size_bytes: eviction::total_size(&map),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            oldest_entry_at: map.values().map(|e| e.created_at).min(),
            newest_entry_at: map.values().map(|e| e.created_at).max(),
            estimated_memory_bytes: estimate_memory(&map),
        }
    }

    // == Cleanup ==
    /// Removes every expired or version-stale entry from the namespace.
    ///
    /// Returns the number of entries removed. Driven by the background
    /// cleanup task; bounds growth from write-only keys.
    pub async fn cleanup_stale(&self) -> Result<usize> {
        let now = current_timestamp_ms();
        let _state = self.state.lock().await;
        let mut map = self.load_map().await;

        let before = map.len();
        map.retain(|_, entry| entry.is_live(&self.config.schema_version, now));
        let removed = before - map.len();

        if removed > 0 {
            self.persist(&map).await?;
        }
        Ok(removed)
    }

    // == Quota Recovery ==
    /// Blunt recovery after the storage layer rejected a write over quota:
    /// drop the top half of entries by score, retry, and as a last resort
    /// clear the namespace and retry with only the new entry.
    async fn recover_quota(
        &self,
        state: &mut StatsCounters,
        key: &str,
        entry: CacheEntry<Payload>,
        now: u64,
    ) -> Result<()> {
        warn!(
            namespace = %self.namespace,
            "storage rejected write over quota, dropping entries to recover"
        );

        // The persisted view is authoritative here; the in-memory map we
        // just failed to write may never have landed.
        let mut map = self.load_map().await;
        let victims =
            eviction::plan_recovery_eviction(&map, now, self.config.recovery_drop_fraction);
        for victim in &victims {
            map.remove(victim);
        }
        state.record_evictions(victims.len());
        map.insert(key.to_string(), entry.clone());

        match self.persist(&map).await {
            Ok(()) => {
                info!(
                    namespace = %self.namespace,
                    dropped = victims.len(),
                    "quota recovery succeeded"
                );
                Ok(())
            }
            Err(StorageError::QuotaExceeded) => {
                warn!(
                    namespace = %self.namespace,
                    "still over quota after recovery, clearing namespace"
                );
                self.storage.remove(&self.storage_key).await?;
                let mut fresh = EntryMap::new();
                fresh.insert(key.to_string(), entry);
                match self.persist(&fresh).await {
                    Ok(()) => Ok(()),
                    Err(StorageError::QuotaExceeded) => Err(CacheError::StorageFull),
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    // == Blob I/O ==
    /// Loads the namespace map from storage.
    ///
    /// A malformed blob means the namespace is corrupt: it is dropped and
    /// the namespace reinitialized empty. Other namespaces are unaffected
    /// because each lives under its own storage key.
    async fn load_map(&self) -> EntryMap {
        match self.storage.load(&self.storage_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(err) => {
                    warn!(
                        namespace = %self.namespace,
                        %err,
                        "dropping malformed namespace blob"
                    );
                    let _ = self.storage.remove(&self.storage_key).await;
                    EntryMap::new()
                }
            },
            Ok(None) => EntryMap::new(),
            Err(err) => {
                warn!(namespace = %self.namespace, %err, "failed to read namespace blob");
                EntryMap::new()
            }
        }
    }

    async fn persist(&self, map: &EntryMap) -> std::result::Result<(), StorageError> {
        let bytes =
            serde_json::to_vec(map).map_err(|err| StorageError::Backend(err.to_string()))?;
        self.storage.save(&self.storage_key, bytes).await
    }

    /// Persists access-stat updates on the read path. Read results are
    /// never failed by a storage hiccup, so errors are only logged.
    async fn persist_best_effort(&self, map: &EntryMap) {
        if let Err(err) = self.persist(map).await {
            warn!(
                namespace = %self.namespace,
                %err,
                "failed to persist namespace blob after read"
            );
        }
    }
}

/// Rough in-memory footprint of a loaded namespace map.
fn estimate_memory(map: &EntryMap) -> u64 {
    map.iter()
        .map(|(key, entry)| {
            (key.len() + std::mem::size_of::<CacheEntry<Payload>>()) as u64 + entry.size_bytes
        })
        .sum()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Thumbnail {
        recording_id: String,
        width: u32,
        height: u32,
    }

    fn sample() -> Thumbnail {
        Thumbnail {
            recording_id: "rec-42".to_string(),
            width: 320,
            height: 180,
        }
    }

    fn store() -> CacheStore {
        CacheStore::new(
            "test",
            Arc::new(MemoryStore::new()),
            CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_set_and_get_roundtrip() {
        let store = store();
        store.set("thumb", &sample(), None).await.unwrap();

        let hit = store.get::<Thumbnail>("thumb").await.unwrap();
        assert_eq!(hit.data, sample());
        assert_eq!(hit.access_count, 1);
        assert_eq!(hit.schema_version, "1");
    }

    #[tokio::test]
    async fn test_get_nonexistent_is_none() {
        let store = store();
        assert!(store.get::<Thumbnail>("missing").await.is_none());

        let stats = store.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let store = store();
        store.set("k", &"first", None).await.unwrap();
        store.set("k", &"second", None).await.unwrap();

        let hit = store.get::<String>("k").await.unwrap();
        assert_eq!(hit.data, "second");
        assert_eq!(store.stats().await.entries, 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = store();
        store.set("k", &1u32, None).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get::<u32>("k").await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration_purges_entry() {
        let store = store();
        store
            .set("k", &1u32, Some(Duration::from_millis(30)))
            .await
            .unwrap();
        assert!(store.get::<u32>("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.get::<u32>("k").await.is_none());
        // Purged on observation, not just hidden
        assert_eq!(store.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_default_ttl_applied() {
        let store = store();
        store.set("k", &1u32, None).await.unwrap();

        let hit = store.get::<u32>("k").await.unwrap();
        assert_eq!(
            hit.expires_at - hit.created_at,
            CacheConfig::default().default_ttl_ms
        );
    }

    #[tokio::test]
    async fn test_version_mismatch_invalidates() {
        let storage: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let v1 = CacheStore::new("ns", storage.clone(), CacheConfig::default());
        v1.set("k", &1u32, None).await.unwrap();

        let v2 = CacheStore::new(
            "ns",
            storage,
            CacheConfig {
                schema_version: "2".to_string(),
                ..CacheConfig::default()
            },
        );
        assert!(v2.get::<u32>("k").await.is_none());
        assert_eq!(v2.stats().await.misses, 1);
        assert_eq!(v2.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_eviction_keeps_total_size_under_cap() {
        let storage: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let store =
            CacheStore::with_max_size("ns", storage, CacheConfig::default(), 600);

        for i in 0..20 {
            let value = "x".repeat(64);
            store.set(&format!("k{i}"), &value, None).await.unwrap();
        }

        let stats = store.stats().await;
        assert!(stats.total_size_bytes <= 600);
        assert!(stats.evictions > 0);
        assert!(stats.entries < 20);
    }

    #[tokio::test]
    async fn test_get_persists_access_stats_across_reopen() {
        let storage: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let first = CacheStore::new("ns", storage.clone(), CacheConfig::default());
        first.set("k", &1u32, None).await.unwrap();
        first.get::<u32>("k").await.unwrap();
        first.get::<u32>("k").await.unwrap();

        let reopened = CacheStore::new("ns", storage, CacheConfig::default());
        let hit = reopened.get::<u32>("k").await.unwrap();
        // Two reads before reopen plus this one
        assert_eq!(hit.access_count, 3);
    }

    #[tokio::test]
    async fn test_clear_resets_counters_and_blob() {
        let store = store();
        store.set("k", &1u32, None).await.unwrap();
        store.get::<u32>("k").await.unwrap();
        store.get::<u32>("missing").await;

        store.clear().await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_corrupted_blob_reinitializes_namespace() {
        let storage: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        storage
            .save(&storage_key("ns"), b"definitely not json".to_vec())
            .await
            .unwrap();

        let store = CacheStore::new("ns", storage, CacheConfig::default());
        assert!(store.get::<u32>("k").await.is_none());

        // Namespace works normally afterwards
        store.set("k", &7u32, None).await.unwrap();
        assert_eq!(store.get::<u32>("k").await.unwrap().data, 7);
    }

    #[tokio::test]
    async fn test_large_payload_roundtrips_compressed() {
        let store = store();
        let value = "frame-data ".repeat(2048);
        store.set("recording", &value, None).await.unwrap();

        let hit = store.get::<String>("recording").await.unwrap();
        assert_eq!(hit.data, value);
        // Stored form is the compressed length, well under the raw size
        assert!(hit.size_bytes < value.len() as u64);
    }

    #[tokio::test]
    async fn test_cleanup_stale_removes_expired_and_stale() {
        let storage: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let v1 = CacheStore::new("ns", storage.clone(), CacheConfig::default());
        v1.set("old", &1u32, Some(Duration::from_millis(20)))
            .await
            .unwrap();

        let v2 = CacheStore::new(
            "ns",
            storage,
            CacheConfig {
                schema_version: "2".to_string(),
                ..CacheConfig::default()
            },
        );
        v2.set("fresh", &2u32, None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        // "old" is both expired and version-stale from v2's point of view
        let removed = v2.cleanup_stale().await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(v2.stats().await.entries, 1);
        assert_eq!(v2.get::<u32>("fresh").await.unwrap().data, 2);
    }

    #[tokio::test]
    async fn test_hit_rate_accounting() {
        let store = store();
        store.set("k", &1u32, None).await.unwrap();

        for _ in 0..3 {
            store.get::<u32>("k").await.unwrap();
        }
        for _ in 0..2 {
            store.get::<u32>("absent").await;
        }

        let stats = store.stats().await;
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 2);
        assert!((stats.hit_rate() - 0.6).abs() < f64::EPSILON);
    }
}
