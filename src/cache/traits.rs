//! Core traits and types shared by the cache, the query pipeline and the stores.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// A single domain entity flowing through the query engine.
///
/// Implementors expose a unique id, a status enumeration, the text fields that
/// free-text search looks at, and named sortable fields.
pub trait Record: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Stored status (e.g. active/inactive, draft/sent/paid).
  type Status: Copy + Eq + Debug + Send + Sync + Serialize + DeserializeOwned + 'static;

  /// Unique identifier within the collection
  fn id(&self) -> &str;

  fn status(&self) -> Self::Status;

  fn set_status(&mut self, status: Self::Status);

  /// Values matched by free-text search. Optional fields that are absent
  /// are simply left out.
  fn search_fields(&self) -> Vec<&str>;

  /// Look up a sortable field by name.
  /// Returns `None` when the field is unknown or absent on this record.
  fn field(&self, key: &str) -> Option<FieldValue<'_>>;

  /// Names accepted by [`Record::field`].
  fn sort_keys() -> &'static [&'static str];

  /// Status a record returns to when restored.
  fn active_status() -> Self::Status;

  /// Collection name, used for endpoints and storage (e.g. "parts").
  fn collection() -> &'static str;
}

/// Typed value of a sortable field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
  Number(f64),
  Text(&'a str),
  Date(NaiveDate),
  Timestamp(DateTime<Utc>),
}

/// Indicates where the items currently held by a collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Nothing loaded yet
  Empty,
  /// Fresh data from network
  Network,
  /// Restored from a local snapshot, not yet refreshed
  Snapshot,
  /// Refresh failed, serving previously loaded data
  Offline,
}

impl CacheSource {
  pub fn label(&self) -> &'static str {
    match self {
      CacheSource::Empty => "empty",
      CacheSource::Network => "live",
      CacheSource::Snapshot => "cached",
      CacheSource::Offline => "offline",
    }
  }
}
