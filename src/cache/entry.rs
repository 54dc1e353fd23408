//! In-memory record cache with time-to-live validity.

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use super::traits::Record;

/// Snapshot of a remote collection.
///
/// `items` is either empty or a complete snapshot as of `fetched_at`.
/// `fetched_at` is `None` before the first load and after invalidation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<R> {
  /// Records in fetch order
  pub items: Vec<R>,
  /// When the snapshot was fetched
  pub fetched_at: Option<DateTime<Utc>>,
}

impl<R> Default for CacheEntry<R> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      fetched_at: None,
    }
  }
}

/// Holds the last fetched collection for one record type.
///
/// The cache is owned by whoever composes the query pipeline and paginator;
/// there is no shared global instance. Every change to `items` bumps
/// `revision`, which downstream memoization keys on.
#[derive(Debug, Clone)]
pub struct RecordCache<R> {
  entry: CacheEntry<R>,
  revision: u64,
}

impl<R> Default for RecordCache<R> {
  fn default() -> Self {
    Self {
      entry: CacheEntry::default(),
      revision: 0,
    }
  }
}

impl<R: Record> RecordCache<R> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Current snapshot, possibly stale.
  pub fn get(&self) -> &CacheEntry<R> {
    &self.entry
  }

  pub fn items(&self) -> &[R] {
    &self.entry.items
  }

  pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
    self.entry.fetched_at
  }

  pub fn revision(&self) -> u64 {
    self.revision
  }

  /// True iff the snapshot is non-empty and younger than `ttl`.
  pub fn is_valid(&self, ttl: Duration) -> bool {
    self.is_valid_at(ttl, Utc::now())
  }

  /// Same as [`RecordCache::is_valid`] against an explicit clock reading.
  pub fn is_valid_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
    match self.entry.fetched_at {
      Some(fetched_at) => !self.entry.items.is_empty() && now - fetched_at < ttl,
      None => false,
    }
  }

  /// Replace the snapshot wholesale and stamp it with the current time.
  pub fn set(&mut self, items: Vec<R>) {
    self.restore(items, Utc::now());
  }

  /// Replace the snapshot, keeping a timestamp taken elsewhere
  /// (e.g. a snapshot persisted by an earlier run).
  pub fn restore(&mut self, items: Vec<R>, fetched_at: DateTime<Utc>) {
    trace!(
      collection = R::collection(),
      count = items.len(),
      "cache snapshot replaced"
    );
    self.entry = CacheEntry {
      items,
      fetched_at: Some(fetched_at),
    };
    self.revision += 1;
  }

  /// Force the next validity check to fail. Items stay available.
  pub fn invalidate(&mut self) {
    self.entry.fetched_at = None;
  }

  pub fn find(&self, id: &str) -> Option<&R> {
    self.entry.items.iter().find(|r| r.id() == id)
  }

  /// Apply `update` to the record with the given id.
  ///
  /// Returns false, without touching anything, when no record has that id.
  /// A fetch landing between a mutation and its patch can remove the record;
  /// that is not an error.
  pub fn patch_one<F>(&mut self, id: &str, update: F) -> bool
  where
    F: FnOnce(&mut R),
  {
    match self.entry.items.iter_mut().find(|r| r.id() == id) {
      Some(record) => {
        update(record);
        self.revision += 1;
        true
      }
      None => false,
    }
  }

  /// Replace the record sharing `record`'s id. No-op if absent.
  pub fn replace_one(&mut self, record: R) -> bool {
    let id = record.id().to_string();
    self.patch_one(&id, move |existing| *existing = record)
  }
}
