//! Typed errors surfaced by the query engine.
//!
//! [`StoreError`] describes what went wrong talking to the remote store.
//! [`QueryError`] is what callers of the engine see: it says which step
//! failed and what state the cache was left in.

use thiserror::Error;

/// Transport-level failure from a [`crate::store::RecordStore`].
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{url} returned HTTP {status}: {body}")]
  Status {
    url: String,
    status: u16,
    body: String,
  },

  #[error("failed to decode response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid endpoint url: {0}")]
  InvalidUrl(String),

  #[error("store unavailable: {0}")]
  Unavailable(String),
}

/// Failure kinds reported by the collection lifecycle and the mutation relay.
///
/// None of these are fatal. The cache is never cleared because of them.
#[derive(Debug, Error)]
pub enum QueryError {
  /// Initial load or refresh failed. Any previously loaded items stay cached.
  #[error("failed to fetch {collection}: {source}")]
  FetchFailed {
    collection: &'static str,
    #[source]
    source: StoreError,
  },

  /// Remote write was not applied. The cache was left untouched.
  #[error("failed to update {id}: {source}")]
  WriteFailed {
    id: String,
    #[source]
    source: StoreError,
  },

  /// The write was confirmed but the record could not be read back,
  /// even after one retry. The local status patch stays applied.
  #[error("{id} was updated but could not be read back")]
  StaleReadAfterWrite {
    id: String,
    #[source]
    source: Option<StoreError>,
  },
}

impl QueryError {
  /// Short label for status lines and log fields.
  pub fn kind(&self) -> &'static str {
    match self {
      QueryError::FetchFailed { .. } => "fetch_failed",
      QueryError::WriteFailed { .. } => "write_failed",
      QueryError::StaleReadAfterWrite { .. } => "stale_read_after_write",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fetch_failed_message_names_collection() {
    let err = QueryError::FetchFailed {
      collection: "parts",
      source: StoreError::Unavailable("offline".to_string()),
    };
    assert_eq!(
      err.to_string(),
      "failed to fetch parts: store unavailable: offline"
    );
    assert_eq!(err.kind(), "fetch_failed");
  }

  #[test]
  fn test_stale_read_without_source() {
    let err = QueryError::StaleReadAfterWrite {
      id: "p-1".to_string(),
      source: None,
    };
    assert!(std::error::Error::source(&err).is_none());
    assert_eq!(err.kind(), "stale_read_after_write");
  }
}
