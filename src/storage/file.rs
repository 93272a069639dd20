//! File Store Module
//!
//! Directory-backed durable store: one file per key, hex-encoded file
//! names so arbitrary keys survive the round trip through the filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::StorageError;
use crate::storage::DurableStore;

const BLOB_EXTENSION: &str = "blob";

// == File Store ==
/// Filesystem-backed [`DurableStore`] backend.
///
/// Writes go through a temporary file and a rename so a crash mid-write
/// never leaves a partially written blob behind.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    // == Constructor ==
    /// Opens a file store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        debug!(root = %root.display(), "opened file store");
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", hex_encode(key), BLOB_EXTENSION))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Backend(err.to_string())),
        }
    }

    async fn save(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &value).await.map_err(map_write_error)?;
        fs::rename(&tmp, &path).await.map_err(map_write_error)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Backend(err.to_string())),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            if let Some(key) = decode_file_stem(&path) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}

/// ENOSPC and EDQUOT both mean the medium is out of room.
fn map_write_error(err: std::io::Error) -> StorageError {
    match err.raw_os_error() {
        Some(28) | Some(122) => StorageError::QuotaExceeded,
        _ => StorageError::Backend(err.to_string()),
    }
}

// == Key Encoding ==
fn hex_encode(key: &str) -> String {
    key.bytes().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(encoded: &str) -> Option<String> {
    if encoded.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..encoded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&encoded[i..i + 2], 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

fn decode_file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(hex_decode)
}
