//! In-memory store with failure injection, for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::Record;
use crate::error::StoreError;

use super::RecordStore;

/// Holds the authoritative records behind a mutex.
pub struct MemoryStore<R> {
  records: Mutex<Vec<R>>,
  fail_fetch: Mutex<bool>,
  fail_write: Mutex<bool>,
  echo_writes: bool,
  /// Number of upcoming `find_by_id` calls that report not-found
  hidden_reads: AtomicUsize,
  fetch_delay: Mutex<Duration>,
  pub fetch_calls: AtomicUsize,
  pub write_calls: AtomicUsize,
  pub read_calls: AtomicUsize,
}

impl<R: Record> MemoryStore<R> {
  pub fn new(records: Vec<R>) -> Self {
    Self {
      records: Mutex::new(records),
      fail_fetch: Mutex::new(false),
      fail_write: Mutex::new(false),
      echo_writes: false,
      hidden_reads: AtomicUsize::new(0),
      fetch_delay: Mutex::new(Duration::ZERO),
      fetch_calls: AtomicUsize::new(0),
      write_calls: AtomicUsize::new(0),
      read_calls: AtomicUsize::new(0),
    }
  }

  /// Return the updated record from `update_status`.
  pub fn echoing(mut self) -> Self {
    self.echo_writes = true;
    self
  }

  pub fn set_fail_fetch(&self, fail: bool) {
    *self.fail_fetch.lock().unwrap() = fail;
  }

  pub fn set_fail_write(&self, fail: bool) {
    *self.fail_write.lock().unwrap() = fail;
  }

  pub fn set_fetch_delay(&self, delay: Duration) {
    *self.fetch_delay.lock().unwrap() = delay;
  }

  /// Make the next `n` reads report not-found, simulating replication lag.
  pub fn hide_next_reads(&self, n: usize) {
    self.hidden_reads.store(n, Ordering::SeqCst);
  }

  pub fn replace_all(&self, records: Vec<R>) {
    *self.records.lock().unwrap() = records;
  }

  pub fn records(&self) -> Vec<R> {
    self.records.lock().unwrap().clone()
  }
}

#[async_trait]
impl<R: Record> RecordStore<R> for MemoryStore<R> {
  async fn fetch_all(&self) -> Result<Vec<R>, StoreError> {
    self.fetch_calls.fetch_add(1, Ordering::SeqCst);
    // Snapshot is taken when the request starts, like a real backend.
    let snapshot = self.records();
    let fail = *self.fail_fetch.lock().unwrap();
    let delay = *self.fetch_delay.lock().unwrap();
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    if fail {
      return Err(StoreError::Unavailable("injected fetch failure".to_string()));
    }
    Ok(snapshot)
  }

  async fn update_status(&self, id: &str, status: R::Status) -> Result<Option<R>, StoreError> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    if *self.fail_write.lock().unwrap() {
      return Err(StoreError::Unavailable("injected write failure".to_string()));
    }

    let mut records = self.records.lock().unwrap();
    let record = records
      .iter_mut()
      .find(|r| r.id() == id)
      .ok_or_else(|| StoreError::Status {
        url: format!("memory://{}/{}", R::collection(), id),
        status: 404,
        body: "not found".to_string(),
      })?;
    record.set_status(status);

    Ok(self.echo_writes.then(|| record.clone()))
  }

  async fn find_by_id(&self, id: &str) -> Result<Option<R>, StoreError> {
    self.read_calls.fetch_add(1, Ordering::SeqCst);
    let hidden = self
      .hidden_reads
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if hidden {
      return Ok(None);
    }
    Ok(self.records().into_iter().find(|r| r.id() == id))
  }
}
