//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of one namespace's state and performance counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Current number of entries in the namespace
    pub entries: usize,
    /// Sum of stored payload sizes in bytes
    pub total_size_bytes: u64,
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent, expired, or stale)
    pub misses: u64,
    /// Number of entries evicted under size pressure or recovery
    pub evictions: u64,
    /// `created_at` of the oldest entry, if any
    pub oldest_entry_at: Option<u64>,
    /// `created_at` of the newest entry, if any
    pub newest_entry_at: Option<u64>,
    /// Rough in-memory footprint of the loaded namespace map
    pub estimated_memory_bytes: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Process-lifetime hit/miss/eviction counters for one store.
///
/// Reset only by an explicit `clear()` of the namespace.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl StatsCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
