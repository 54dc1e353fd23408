//! Client-side query engine for a parts shop back office.
//!
//! Records (parts, invoices, suppliers, transactions) are fetched in full from
//! a remote store, held in an explicitly owned [`cache::RecordCache`], and
//! served to list views through a pure query pipeline (status partition,
//! search, categorical filter, stable sort) and a paginator. Status changes go
//! through a [`relay::MutationRelay`] that patches the cache only after the
//! remote write is confirmed.

pub mod app;
pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod format;
pub mod query;
pub mod relay;
pub mod report;
pub mod store;

pub use error::{QueryError, StoreError};
