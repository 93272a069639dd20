//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL, schema
//! version, and access-tracking metadata.

use serde::{Deserialize, Serialize};

use crate::codec::Payload;

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
///
/// Entries are persisted as `CacheEntry<Payload>`; lookups hand back a
/// `CacheEntry<T>` with the payload decoded. Field names follow the wire
/// format of the namespace blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The stored payload
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Absolute expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Schema version the entry was written under
    pub schema_version: String,
    /// Number of successful reads of this entry
    pub access_count: u64,
    /// Timestamp of the last successful read (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Exact byte length of the stored payload form
    pub size_bytes: u64,
}

impl CacheEntry<Payload> {
    // == Constructor ==
    /// Creates a new entry expiring `ttl_ms` after `now`.
    pub(crate) fn new(data: Payload, now: u64, ttl_ms: u64, schema_version: String) -> Self {
        let size_bytes = data.size_bytes();
        Self {
            data,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
            schema_version,
            access_count: 0,
            last_accessed_at: now,
            size_bytes,
        }
    }
}

impl<T> CacheEntry<T> {
    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to the expiration time.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    // == Is Live ==
    /// An entry is live iff it carries the current schema version and has
    /// not expired. Anything else is logically absent.
    pub fn is_live(&self, current_version: &str, now: u64) -> bool {
        self.schema_version == current_version && !self.is_expired(now)
    }

    // == Touch ==
    /// Records a successful read.
    pub(crate) fn touch(&mut self, now: u64) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    // == Eviction Score ==
    /// Removal priority: larger, less-used, longer-idle entries score
    /// higher and are evicted first.
    pub fn eviction_score(&self, now: u64) -> f64 {
        let idle_ms = now.saturating_sub(self.last_accessed_at) as f64;
        self.size_bytes as f64 / (self.access_count + 1) as f64 * idle_ms
    }

    // == Time To Live ==
    /// Remaining TTL in milliseconds as of `now`, 0 once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }

    // == With Data ==
    /// Clones the metadata around a replacement payload.
    pub(crate) fn with_data<U>(&self, data: U) -> CacheEntry<U> {
        CacheEntry {
            data,
            created_at: self.created_at,
            expires_at: self.expires_at,
            schema_version: self.schema_version.clone(),
            access_count: self.access_count,
            last_accessed_at: self.last_accessed_at,
            size_bytes: self.size_bytes,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
