//! Record caching for fetched collections.
//!
//! This module provides:
//! - [`RecordCache`], the in-memory snapshot of one collection with TTL validity
//! - The [`Record`] trait every cached entity implements
//! - Snapshot persistence for serving stale data when the store is unreachable

mod entry;
mod storage;
mod traits;

pub use entry::{CacheEntry, RecordCache};
pub use storage::{CachedSnapshot, NoopStorage, SnapshotStorage, SqliteStorage};
pub use traits::{CacheSource, FieldValue, Record};
