//! Probing Engine
//!
//! Per-target TCP sampling loops and their lifecycle:
//!
//! - [`Target`]: a monitored `host[:port]` identifier
//! - [`Prober`]: one free-running sampling loop per target, cooperative
//!   cancellation via `CancellationToken`
//! - [`Controller`]: the registry that owns prober lifecycle and enforces
//!   at-most-one-live-prober-per-target
//!
//! # Example
//!
//! ```rust,ignore
//! use tcpwatch::probe::Controller;
//! use tcpwatch::storage::{Database, SampleStore};
//!
//! let db = Database::connect("sqlite:tcpwatch.db").await?;
//! let store = SampleStore::open(db, "office").await?;
//! let controller = Controller::recover(store).await?;
//! controller.start("example.org:443").await;
//! // ...
//! controller.stop("example.org:443").await; // returns once fully stopped
//! ```

mod controller;
mod prober;
mod target;

pub use controller::Controller;
pub use prober::{CONNECT_TIMEOUT, PROBE_INTERVAL, Prober};
pub use target::Target;
