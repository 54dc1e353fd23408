//! Query pipeline, categorical filters, pagination and memoization.
//!
//! Data flows one way: cached items -> [`pipeline::run`] -> [`PageState`].

pub mod filter;
pub mod memo;
pub mod paginate;
pub mod pipeline;

pub use filter::{AllRecords, CategoryFilter, InvoiceFilter, PartFilter, TransactionFilter};
pub use memo::MemoizedPipeline;
pub use paginate::PageState;
pub use pipeline::{run, QueryParams, SortDirection, SortSpec};
