//! Refresh lifecycle for one cached collection.
//!
//! A `Collection<R, S>` owns the [`RecordCache`] for one record type and
//! drives it through the load/refresh state machine:
//!
//! ```text
//! Idle -> Loading -> Loaded | LoadFailed
//! Loaded -> Refreshing -> Loaded | LoadFailed (previous items kept)
//! ```
//!
//! Fetches run on a spawned task and report back over a channel, so a
//! refresh in flight never blocks a mutation.
//!
//! # Example
//!
//! ```ignore
//! let mut parts = Collection::<Part, _>::new(store.clone());
//!
//! // Start fetching
//! parts.ensure_fresh();
//!
//! // In event loop tick
//! if parts.poll() {
//!     // State changed, re-render
//! }
//!
//! // Or wait for it
//! parts.settle().await;
//! let view = parts.view(&QueryParams::<_, PartFilter>::new(ActiveStatus::Active));
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::{CacheSource, Record, RecordCache};
use crate::error::{QueryError, StoreError};
use crate::query::{CategoryFilter, MemoizedPipeline, QueryParams};
use crate::relay::MutationRelay;
use crate::store::RecordStore;

/// Default time-to-live for a fetched snapshot (3 minutes).
pub const DEFAULT_TTL_MILLIS: i64 = 180_000;

/// Where a collection is in its load/refresh lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
  /// Nothing requested yet
  Idle,
  /// First fetch in flight, nothing to show
  Loading,
  /// Items available
  Loaded,
  /// Refetch in flight, previous items still shown
  Refreshing,
  /// Last fetch failed; any previous items are still cached
  LoadFailed,
}

type FetchResult<R> = Result<Vec<R>, StoreError>;

pub struct Collection<R: Record, S> {
  relay: MutationRelay<S>,
  cache: RecordCache<R>,
  state: LoadState,
  source: CacheSource,
  ttl: Duration,
  receiver: Option<mpsc::UnboundedReceiver<FetchResult<R>>>,
  error: Option<QueryError>,
  /// Records patched while a fetch was in flight, re-applied when it lands
  patched_in_flight: Vec<R>,
  memo: MemoizedPipeline,
}

impl<R, S> Collection<R, S>
where
  R: Record,
  S: RecordStore<R> + 'static,
{
  pub fn new(store: Arc<S>) -> Self {
    Self::with_relay(MutationRelay::new(store))
  }

  pub fn with_relay(relay: MutationRelay<S>) -> Self {
    Self {
      relay,
      cache: RecordCache::new(),
      state: LoadState::Idle,
      source: CacheSource::Empty,
      ttl: Duration::milliseconds(DEFAULT_TTL_MILLIS),
      receiver: None,
      error: None,
      patched_in_flight: Vec::new(),
      memo: MemoizedPipeline::new(),
    }
  }

  /// Set how long a fetched snapshot stays fresh.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Seed the cache with a persisted snapshot, keeping its original timestamp.
  ///
  /// Seeded items are served like any loaded items; whether they are fresh
  /// enough is decided by [`Collection::ensure_fresh`].
  pub fn seed(&mut self, items: Vec<R>, fetched_at: DateTime<Utc>) {
    if items.is_empty() || self.receiver.is_some() {
      return;
    }
    debug!(
      collection = R::collection(),
      count = items.len(),
      %fetched_at,
      "seeding from snapshot"
    );
    self.cache.restore(items, fetched_at);
    self.state = LoadState::Loaded;
    self.source = CacheSource::Snapshot;
  }

  pub fn state(&self) -> LoadState {
    self.state
  }

  pub fn source(&self) -> CacheSource {
    self.source
  }

  pub fn cache(&self) -> &RecordCache<R> {
    &self.cache
  }

  pub fn items(&self) -> &[R] {
    self.cache.items()
  }

  pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
    self.cache.fetched_at()
  }

  /// True while a fetch is in flight, whether or not items are shown.
  pub fn is_loading(&self) -> bool {
    matches!(self.state, LoadState::Loading | LoadState::Refreshing)
  }

  pub fn is_fresh(&self) -> bool {
    self.cache.is_valid(self.ttl)
  }

  /// Error from the last failed fetch, kept until the next successful one.
  pub fn error(&self) -> Option<&QueryError> {
    self.error.as_ref()
  }

  /// Take the last error for one-shot display (e.g. a toast).
  pub fn take_error(&mut self) -> Option<QueryError> {
    self.error.take()
  }

  /// Start a fetch unless one is already in flight.
  pub fn fetch(&mut self) {
    if self.receiver.is_some() {
      return;
    }
    self.start_fetch();
  }

  /// Start a fetch, superseding any fetch in flight. The superseded result
  /// is discarded when it arrives.
  pub fn refresh(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Fetch if nothing was requested yet or the snapshot has expired.
  /// Returns true if a fetch is now in flight.
  pub fn ensure_fresh(&mut self) -> bool {
    if self.receiver.is_none() && (self.state == LoadState::Idle || !self.is_fresh()) {
      self.start_fetch();
    }
    self.receiver.is_some()
  }

  /// Make the next [`Collection::ensure_fresh`] refetch. Items stay visible.
  pub fn invalidate(&mut self) {
    self.cache.invalidate();
  }

  /// Poll for the result of a pending fetch.
  ///
  /// Returns `true` if the state changed. Call this in the event loop tick.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(result) => {
        self.land(result);
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.land(Err(abandoned()));
        true
      }
    }
  }

  /// Wait for a pending fetch to land. Returns `false` if none was pending.
  pub async fn settle(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    let result = receiver.recv().await.unwrap_or_else(|| Err(abandoned()));
    self.land(result);
    true
  }

  /// Run the query pipeline over the cached items.
  ///
  /// Results are memoized on the cache revision and the parameters.
  pub fn view<F>(&mut self, params: &QueryParams<R::Status, F>) -> Vec<&R>
  where
    F: CategoryFilter<R>,
  {
    self
      .memo
      .run(self.cache.items(), self.cache.revision(), params)
  }

  /// Change a record's status through the mutation relay.
  ///
  /// On `WriteFailed` the cache is untouched. On success, callers re-run
  /// [`Collection::view`] to see the change; no refetch happens.
  pub async fn apply_status_change(&mut self, id: &str, status: R::Status) -> Result<(), QueryError> {
    let outcome = self
      .relay
      .write_through(&mut self.cache, id, status)
      .await;

    // A fetch that started before the write may still carry the old status.
    // On a stale re-read only the local patch is known, and only if cached.
    if self.receiver.is_some() {
      let confirmed = match &outcome {
        Ok(record) => Some(record.clone()),
        Err(QueryError::StaleReadAfterWrite { .. }) => self.cache.find(id).cloned(),
        Err(_) => None,
      };
      if let Some(record) = confirmed {
        self.remember_in_flight(record);
      }
    }

    outcome.map(|_| ())
  }

  /// Return a record to its collection's active status.
  pub async fn restore(&mut self, id: &str) -> Result<(), QueryError> {
    self.apply_status_change(id, R::active_status()).await
  }

  fn remember_in_flight(&mut self, record: R) {
    match self
      .patched_in_flight
      .iter_mut()
      .find(|r| r.id() == record.id())
    {
      Some(existing) => *existing = record,
      None => self.patched_in_flight.push(record),
    }
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = if self.cache.items().is_empty() {
      LoadState::Loading
    } else {
      LoadState::Refreshing
    };
    // Patches from a superseded fetch window are already in the cache.
    self.patched_in_flight.clear();
    debug!(collection = R::collection(), state = ?self.state, "fetch started");

    let store = Arc::clone(self.relay.store());
    tokio::spawn(async move {
      let result = store.fetch_all().await;
      // Ignore send errors - the collection may have been dropped
      let _ = tx.send(result);
    });
  }

  fn land(&mut self, result: FetchResult<R>) {
    self.receiver = None;

    match result {
      Ok(items) => {
        debug!(
          collection = R::collection(),
          count = items.len(),
          reapplied = self.patched_in_flight.len(),
          "fetch landed"
        );
        self.cache.set(items);
        for record in self.patched_in_flight.drain(..) {
          self.cache.replace_one(record);
        }
        self.state = LoadState::Loaded;
        self.source = CacheSource::Network;
        self.error = None;
      }
      Err(source) => {
        debug!(collection = R::collection(), error = %source, "fetch failed");
        self.patched_in_flight.clear();
        self.state = LoadState::LoadFailed;
        if !self.cache.items().is_empty() {
          self.source = CacheSource::Offline;
        }
        self.error = Some(QueryError::FetchFailed {
          collection: R::collection(),
          source,
        });
      }
    }
  }
}

fn abandoned() -> StoreError {
  StoreError::Unavailable("fetch task ended without a result".to_string())
}

impl<R: Record, S> std::fmt::Debug for Collection<R, S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Collection")
      .field("collection", &R::collection())
      .field("state", &self.state)
      .field("source", &self.source)
      .field("items", &self.cache.items().len())
      .field("fetched_at", &self.cache.fetched_at())
      .field("ttl", &self.ttl)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::PartFilter;
  use crate::store::memory::MemoryStore;
  use crate::store::types::{ActiveStatus, Part};
  use std::sync::atomic::Ordering;
  use std::time::Duration as StdDuration;

  fn parts() -> Vec<Part> {
    vec![
      Part::new("1".to_string(), "Bolt".to_string(), 5),
      Part::new("2".to_string(), "Nut".to_string(), 0),
    ]
  }

  fn collection(store: &Arc<MemoryStore<Part>>) -> Collection<Part, MemoryStore<Part>> {
    let relay = MutationRelay::new(Arc::clone(store)).with_reread_delay(StdDuration::from_millis(1));
    Collection::with_relay(relay)
  }

  fn active() -> QueryParams<ActiveStatus, PartFilter> {
    QueryParams::new(ActiveStatus::Active)
  }

  #[tokio::test]
  async fn test_first_load() {
    let store = Arc::new(MemoryStore::new(parts()));
    let mut parts = collection(&store);
    assert_eq!(parts.state(), LoadState::Idle);

    assert!(parts.ensure_fresh());
    assert_eq!(parts.state(), LoadState::Loading);

    assert!(parts.settle().await);
    assert_eq!(parts.state(), LoadState::Loaded);
    assert_eq!(parts.source(), CacheSource::Network);
    assert_eq!(parts.items().len(), 2);
    assert!(parts.is_fresh());
  }

  #[tokio::test]
  async fn test_first_load_failure_stays_empty() {
    let store = Arc::new(MemoryStore::new(parts()));
    store.set_fail_fetch(true);
    let mut parts = collection(&store);

    parts.fetch();
    parts.settle().await;

    assert_eq!(parts.state(), LoadState::LoadFailed);
    assert!(parts.items().is_empty());
    assert!(matches!(
      parts.error(),
      Some(QueryError::FetchFailed {
        collection: "parts",
        ..
      })
    ));
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_stale_items() {
    let store = Arc::new(MemoryStore::new(parts()));
    let mut parts = collection(&store);
    parts.fetch();
    parts.settle().await;

    store.set_fail_fetch(true);
    parts.refresh();
    assert_eq!(parts.state(), LoadState::Refreshing);
    assert_eq!(parts.items().len(), 2);

    parts.settle().await;
    assert_eq!(parts.state(), LoadState::LoadFailed);
    assert_eq!(parts.source(), CacheSource::Offline);
    assert_eq!(parts.items().len(), 2);
    assert!(parts.take_error().is_some());
    assert!(parts.error().is_none());
  }

  #[tokio::test]
  async fn test_fresh_cache_is_not_refetched() {
    let store = Arc::new(MemoryStore::new(parts()));
    let mut parts = collection(&store);
    parts.ensure_fresh();
    parts.settle().await;

    assert!(!parts.ensure_fresh());
    assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);

    parts.invalidate();
    assert!(parts.ensure_fresh());
    assert_eq!(parts.state(), LoadState::Refreshing);
    parts.settle().await;
    assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let store = Arc::new(MemoryStore::new(parts()));
    store.set_fetch_delay(StdDuration::from_millis(50));
    let mut parts = collection(&store);

    parts.fetch();
    parts.fetch();
    assert!(parts.is_loading());
    parts.settle().await;

    assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_poll_reports_landing() {
    let store = Arc::new(MemoryStore::new(parts()));
    let mut parts = collection(&store);

    assert!(!parts.poll());
    parts.fetch();
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    assert!(parts.poll());
    assert_eq!(parts.state(), LoadState::Loaded);
    assert!(!parts.poll());
  }

  #[tokio::test]
  async fn test_seeded_snapshot_refreshes_when_expired() {
    let store = Arc::new(MemoryStore::new(parts()));
    let mut parts = collection(&store);
    let mut snapshot = parts_fixture_inactive();
    snapshot.truncate(1);

    parts.seed(snapshot, Utc::now() - Duration::hours(1));
    assert_eq!(parts.state(), LoadState::Loaded);
    assert_eq!(parts.source(), CacheSource::Snapshot);
    assert!(!parts.is_fresh());

    assert!(parts.ensure_fresh());
    assert_eq!(parts.state(), LoadState::Refreshing);
    parts.settle().await;
    assert_eq!(parts.items().len(), 2);
  }

  #[tokio::test]
  async fn test_fresh_snapshot_is_served_without_fetch() {
    let store = Arc::new(MemoryStore::new(parts()));
    let mut parts = collection(&store);

    parts.seed(parts_fixture_inactive(), Utc::now() - Duration::seconds(5));

    assert!(parts.is_fresh());
    assert!(!parts.ensure_fresh());
    assert!(!parts.settle().await);
    assert_eq!(parts.source(), CacheSource::Snapshot);
    assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 0);
  }

  fn parts_fixture_inactive() -> Vec<Part> {
    let mut items = parts();
    for p in &mut items {
      p.status = ActiveStatus::Inactive;
    }
    items
  }

  #[tokio::test]
  async fn test_status_change_updates_view_without_refetch() {
    let store = Arc::new(MemoryStore::new(parts()));
    let mut parts = collection(&store);
    parts.fetch();
    parts.settle().await;
    assert_eq!(parts.view(&active()).len(), 2);

    parts
      .apply_status_change("1", ActiveStatus::Inactive)
      .await
      .unwrap();

    let ids: Vec<&str> = parts.view(&active()).iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["2"]);
    assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_failed_status_change_keeps_snapshot() {
    let store = Arc::new(MemoryStore::new(parts()));
    let mut parts = collection(&store);
    parts.fetch();
    parts.settle().await;
    let before = parts.cache().get().clone();

    store.set_fail_write(true);
    let result = parts.apply_status_change("1", ActiveStatus::Inactive).await;

    assert!(matches!(result, Err(QueryError::WriteFailed { .. })));
    assert_eq!(parts.cache().get(), &before);
  }

  #[tokio::test]
  async fn test_patch_survives_in_flight_refresh() {
    let store = Arc::new(MemoryStore::new(parts()));
    let mut parts = collection(&store);
    parts.fetch();
    parts.settle().await;

    // The refresh snapshots the store before the write lands.
    store.set_fetch_delay(StdDuration::from_millis(50));
    parts.refresh();
    tokio::time::sleep(StdDuration::from_millis(10)).await;

    parts
      .apply_status_change("1", ActiveStatus::Inactive)
      .await
      .unwrap();
    parts.settle().await;

    assert_eq!(
      parts.cache().find("1").map(|p| p.status),
      Some(ActiveStatus::Inactive)
    );
  }

  #[tokio::test]
  async fn test_patch_during_first_load_survives() {
    let store = Arc::new(MemoryStore::new(parts()));
    store.set_fetch_delay(StdDuration::from_millis(50));
    let mut parts = collection(&store);
    parts.fetch();
    tokio::time::sleep(StdDuration::from_millis(10)).await;
    assert_eq!(parts.state(), LoadState::Loading);

    parts
      .apply_status_change("1", ActiveStatus::Inactive)
      .await
      .unwrap();
    assert!(parts.items().is_empty());
    parts.settle().await;

    assert_eq!(
      parts.cache().find("1").map(|p| p.status),
      Some(ActiveStatus::Inactive)
    );
    assert_eq!(parts.view(&active()).len(), 1);
  }

  #[tokio::test]
  async fn test_dropped_collection_discards_result() {
    let store = Arc::new(MemoryStore::new(parts()));
    store.set_fetch_delay(StdDuration::from_millis(20));
    let mut parts = collection(&store);
    parts.fetch();
    drop(parts);

    // The spawned fetch completes and its send fails silently.
    tokio::time::sleep(StdDuration::from_millis(50)).await;
    assert_eq!(store.fetch_calls.load(Ordering::SeqCst), 1);
  }
}
