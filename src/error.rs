//! Error types for the cache subsystem
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Storage Error Enum ==
/// Failure modes of the durable storage collaborator.
///
/// Quota exhaustion is distinguished from every other failure because the
/// cache reacts to it with a dedicated recovery path; all remaining backend
/// failures are opaque to the cache layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing medium refused the write because it is out of space
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// Any other failure of the backing medium
    #[error("storage backend error: {0}")]
    Backend(String),
}

// == Cache Error Enum ==
/// Unified error type for cache operations.
///
/// Content-level problems (expired entries, schema skew, undecodable
/// payloads on read) are resolved internally and surface as misses, never
/// as errors. Only serialization failures on write and systemic storage
/// failures reach the caller.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The payload could not be serialized; the write is rejected
    #[error("failed to serialize cache payload: {0}")]
    Serialization(String),

    /// The stored payload could not be decoded back into the requested type
    #[error("failed to decode cache payload: {0}")]
    Deserialization(String),

    /// Storage stayed over quota even after recovery eviction
    #[error("cache storage is full: quota still exceeded after recovery")]
    StorageFull,

    /// Non-quota storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        assert_eq!(
            StorageError::QuotaExceeded.to_string(),
            "storage quota exceeded"
        );
        assert_eq!(
            StorageError::Backend("disk offline".to_string()).to_string(),
            "storage backend error: disk offline"
        );
    }

    #[test]
    fn test_cache_error_from_storage_error() {
        let err = CacheError::from(StorageError::Backend("io".to_string()));
        assert!(matches!(err, CacheError::Storage(StorageError::Backend(_))));
    }

    #[test]
    fn test_storage_full_display() {
        let err = CacheError::StorageFull;
        assert!(err.to_string().contains("full"));
    }
}
