//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// The eviction headroom and recovery drop fraction are deliberately exposed
/// here instead of being hard-coded in the eviction logic.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL in milliseconds for entries without explicit TTL
    pub default_ttl_ms: u64,
    /// Maximum serialized size of one namespace in bytes
    pub max_namespace_size_bytes: u64,
    /// Background cleanup task interval in milliseconds
    pub cleanup_interval_ms: u64,
    /// Schema version tag; entries written under a different tag are invalid
    pub schema_version: String,
    /// Payloads whose serialized form exceeds this are compressed
    pub compression_threshold_bytes: usize,
    /// Master switch for payload compression
    pub compression_enabled: bool,
    /// Proactive eviction stops once total size drops below
    /// `max_namespace_size_bytes * eviction_headroom`
    pub eviction_headroom: f64,
    /// Fraction of entries (by count) dropped during quota recovery
    pub recovery_drop_fraction: f64,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `NSCACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `NSCACHE_MAX_NAMESPACE_SIZE_BYTES` - Max namespace size (default: 5242880)
    /// - `NSCACHE_CLEANUP_INTERVAL_MS` - Cleanup frequency (default: 300000)
    /// - `NSCACHE_SCHEMA_VERSION` - Schema version tag (default: "1")
    /// - `NSCACHE_COMPRESSION_THRESHOLD_BYTES` - Compression threshold (default: 10240)
    /// - `NSCACHE_COMPRESSION_ENABLED` - Enable compression (default: true)
    /// - `NSCACHE_EVICTION_HEADROOM` - Eviction target fraction (default: 0.8)
    /// - `NSCACHE_RECOVERY_DROP_FRACTION` - Recovery drop fraction (default: 0.5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl_ms: env_parse("NSCACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            max_namespace_size_bytes: env_parse(
                "NSCACHE_MAX_NAMESPACE_SIZE_BYTES",
                defaults.max_namespace_size_bytes,
            ),
            cleanup_interval_ms: env_parse(
                "NSCACHE_CLEANUP_INTERVAL_MS",
                defaults.cleanup_interval_ms,
            ),
            schema_version: env::var("NSCACHE_SCHEMA_VERSION")
                .unwrap_or(defaults.schema_version),
            compression_threshold_bytes: env_parse(
                "NSCACHE_COMPRESSION_THRESHOLD_BYTES",
                defaults.compression_threshold_bytes,
            ),
            compression_enabled: env_parse(
                "NSCACHE_COMPRESSION_ENABLED",
                defaults.compression_enabled,
            ),
            eviction_headroom: env_parse("NSCACHE_EVICTION_HEADROOM", defaults.eviction_headroom),
            recovery_drop_fraction: env_parse(
                "NSCACHE_RECOVERY_DROP_FRACTION",
                defaults.recovery_drop_fraction,
            ),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 5 * 60 * 1000,
            max_namespace_size_bytes: 5 * 1024 * 1024,
            cleanup_interval_ms: 5 * 60 * 1000,
            schema_version: "1".to_string(),
            compression_threshold_bytes: 10 * 1024,
            compression_enabled: true,
            eviction_headroom: 0.8,
            recovery_drop_fraction: 0.5,
        }
    }
}

/// Reads an environment variable and parses it, falling back on any failure.
fn env_parse<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
