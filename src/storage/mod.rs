//! Storage Layer
//!
//! SQLite-backed sample persistence with incremental retrieval:
//!
//! - [`Database`]: pooled SQLite connection handling (WAL mode)
//! - [`SampleStore`]: per-dataset append/query/purge operations
//! - [`Sample`] / [`SampleBatch`]: the observation and poll-result types
//!
//! Each live prober writes through the shared pool independently; rows are
//! logically partitioned by target, so writers never coordinate in-process.

mod db;
mod error;
mod store;
mod types;

pub use db::Database;
pub use error::StorageError;
pub use store::{SampleStore, list_datasets};
pub use types::{Sample, SampleBatch};
