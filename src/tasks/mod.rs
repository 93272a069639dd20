//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a cache store.
//!
//! # Tasks
//! - Stale-entry cleanup: removes expired and version-stale entries at
//!   configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
