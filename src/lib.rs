//! nscache - namespaced persistent key-value cache
//!
//! Provides TTL expiry, schema versioning, size-bounded storage with
//! usage-aware eviction, transparent payload compression, and recovery
//! from storage quota exhaustion.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod registry;
pub mod storage;
pub mod tasks;

pub use cache::{current_timestamp_ms, CacheEntry, CacheStats, CacheStore, STORAGE_KEY_PREFIX};
pub use codec::{Payload, SerializationCodec};
pub use config::CacheConfig;
pub use error::{CacheError, Result, StorageError};
pub use registry::{CacheRegistry, GlobalStats};
pub use storage::{DurableStore, FileStore, MemoryStore};
pub use tasks::spawn_cleanup_task;
