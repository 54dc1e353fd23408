//! Remote record store boundary.
//!
//! The engine only needs three operations from the backend: fetch a complete
//! collection, write a status change, and read a single record back.

pub mod api_types;
pub mod client;
#[cfg(test)]
pub mod memory;
mod records;
pub mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::cache::Record;
use crate::error::StoreError;

pub use client::HttpStore;

/// External collaborator holding the authoritative copy of a collection.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
  /// Fetch a complete, consistent snapshot of the collection.
  async fn fetch_all(&self) -> Result<Vec<R>, StoreError>;

  /// Write a status change.
  ///
  /// Returns the updated record when the backend echoes it back, `None`
  /// when it only acknowledges the write.
  async fn update_status(&self, id: &str, status: R::Status) -> Result<Option<R>, StoreError>;

  /// Read a single record. `Ok(None)` means not found.
  async fn find_by_id(&self, id: &str) -> Result<Option<R>, StoreError>;
}

/// Records that have a wire representation to normalize from.
pub trait WireRecord: Record {
  type Wire: DeserializeOwned + Into<Self> + Send;
}

impl WireRecord for types::Part {
  type Wire = api_types::ApiPart;
}

impl WireRecord for types::Invoice {
  type Wire = api_types::ApiInvoice;
}

impl WireRecord for types::Supplier {
  type Wire = api_types::ApiSupplier;
}

impl WireRecord for types::Transaction {
  type Wire = api_types::ApiTransaction;
}
