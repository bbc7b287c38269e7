//! tcpwatch - TCP Reachability and Latency Monitoring
//!
//! This crate continuously measures TCP-handshake reachability and round-trip
//! latency to user-specified targets, stores the measurements as a per-dataset
//! time series, and serves incremental "since last seen" reads over HTTP. It
//! can be used as a library, or run as a standalone binary with the
//! `tcpwatch` executable.
//!
//! # Architecture
//!
//! - **Probe**: per-target sampling loops ([`Prober`]) and their lifecycle
//!   ([`Controller`], at most one live prober per target)
//! - **Storage**: SQLite-backed sample persistence and incremental queries
//! - **Monitor**: the active-dataset context owned by the serving layer
//! - **Server**: the HTTP API for dataset, probe, and read operations
//!
//! # Example
//!
//! ```rust,ignore
//! use tcpwatch::{Controller, Database, SampleStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:tcpwatch.db").await?;
//!     let store = SampleStore::open(db, "office").await?;
//!     let controller = Controller::recover(store.clone()).await?;
//!
//!     controller.start("example.org:443").await;
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!
//!     let batch = store.query("example.org:443", None).await?;
//!     println!("{} samples, cursor {:?}", batch.len(), batch.last_fetched);
//!
//!     controller.stop("example.org:443").await; // returns once fully stopped
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod monitor;
pub mod probe;
pub mod server;
pub mod storage;

pub use monitor::{ActiveDataset, Monitor, MonitorError};
pub use probe::{Controller, Prober, Target};
pub use storage::{Database, Sample, SampleBatch, SampleStore, StorageError};
