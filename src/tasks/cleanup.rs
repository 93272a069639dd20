//! Stale-Entry Cleanup Task
//!
//! Background task that periodically removes expired and version-stale
//! entries from one namespace.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

/// Spawns a background task that periodically sweeps a namespace.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. Each sweep takes the store's own namespace lock, so it
/// never races a concurrent write. Write-only keys that are never read
/// again are bounded by this sweep.
///
/// # Arguments
/// * `store` - Shared reference to the namespace's cache store
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// when the store is disposed.
pub fn spawn_cleanup_task(store: Arc<CacheStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            namespace = store.namespace(),
            interval_ms = interval.as_millis() as u64,
            "starting cache cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            match store.cleanup_stale().await {
                Ok(0) => {
                    debug!(namespace = store.namespace(), "cleanup: nothing stale");
                }
                Ok(removed) => {
                    info!(
                        namespace = store.namespace(),
                        removed, "cleanup: removed stale entries"
                    );
                }
                Err(err) => {
                    warn!(namespace = store.namespace(), %err, "cleanup sweep failed");
                }
            }
        }
    })
}
