//! Mutation relay: confirm a remote status write, then patch the cache.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, Record, RecordCache};
use crate::error::QueryError;
use crate::store::RecordStore;

/// Delay before the single re-read retry after a not-found read.
const DEFAULT_REREAD_DELAY: Duration = Duration::from_millis(250);

/// Applies status changes to a cache after the store confirms them.
///
/// Nothing is patched before the write succeeds, so a failed write leaves the
/// cache exactly as it was. Writes are never retried here; retrying is the
/// caller's decision.
pub struct MutationRelay<S> {
  store: Arc<S>,
  reread_delay: Duration,
}

impl<S> Clone for MutationRelay<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      reread_delay: self.reread_delay,
    }
  }
}

impl<S> MutationRelay<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      reread_delay: DEFAULT_REREAD_DELAY,
    }
  }

  pub fn with_reread_delay(mut self, delay: Duration) -> Self {
    self.reread_delay = delay;
    self
  }

  pub fn store(&self) -> &Arc<S> {
    &self.store
  }

  /// Write `status` for `id`, then patch the cache.
  ///
  /// If the store echoes the updated record it replaces the cached one.
  /// Otherwise the status is patched locally and the record is re-read for
  /// its authoritative state; a not-found re-read is retried once before
  /// reporting [`QueryError::StaleReadAfterWrite`].
  pub async fn apply_status_change<'c, R>(
    &self,
    cache: &'c mut RecordCache<R>,
    id: &str,
    status: R::Status,
  ) -> Result<&'c CacheEntry<R>, QueryError>
  where
    R: Record,
    S: RecordStore<R>,
  {
    self.write_through(cache, id, status).await?;
    Ok(cache.get())
  }

  /// Same as [`MutationRelay::apply_status_change`], returning the
  /// authoritative record even when the cache does not hold it.
  pub async fn write_through<R>(
    &self,
    cache: &mut RecordCache<R>,
    id: &str,
    status: R::Status,
  ) -> Result<R, QueryError>
  where
    R: Record,
    S: RecordStore<R>,
  {
    let echoed = self
      .store
      .update_status(id, status)
      .await
      .map_err(|source| QueryError::WriteFailed {
        id: id.to_string(),
        source,
      })?;

    let record = match echoed {
      Some(record) => record,
      None => {
        cache.patch_one(id, |r| r.set_status(status));
        self.reread::<R>(id).await?
      }
    };

    if !cache.replace_one(record.clone()) {
      debug!(collection = R::collection(), id, "updated record not in cache");
    }

    debug!(collection = R::collection(), id, ?status, "status change applied");
    Ok(record)
  }

  /// Return a record to its collection's active status.
  pub async fn restore<'c, R>(
    &self,
    cache: &'c mut RecordCache<R>,
    id: &str,
  ) -> Result<&'c CacheEntry<R>, QueryError>
  where
    R: Record,
    S: RecordStore<R>,
  {
    self.apply_status_change(cache, id, R::active_status()).await
  }

  /// Read a record back after a confirmed write, retrying once on not-found.
  async fn reread<R>(&self, id: &str) -> Result<R, QueryError>
  where
    R: Record,
    S: RecordStore<R>,
  {
    let mut last_error = None;

    for attempt in 0..2 {
      if attempt > 0 {
        debug!(collection = R::collection(), id, "record not readable yet, retrying");
        tokio::time::sleep(self.reread_delay).await;
      }

      match self.store.find_by_id(id).await {
        Ok(Some(record)) => return Ok(record),
        Ok(None) => last_error = None,
        Err(e) => last_error = Some(e),
      }
    }

    Err(QueryError::StaleReadAfterWrite {
      id: id.to_string(),
      source: last_error,
    })
  }
}
