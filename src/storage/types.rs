//! Core data types for the storage layer.
//!
//! - [`Sample`]: one timestamped latency observation for a target
//! - [`SampleBatch`]: the incremental query result consumed by pollers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One latency observation for a monitored target.
///
/// `delay_ms` is `None` when the probe attempted a connection and it failed
/// or timed out — a first-class observation, not an error. The timestamp is
/// assigned by the store at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Wall-clock write time (UTC).
    pub ts: DateTime<Utc>,
    /// Connect latency in milliseconds, `None` on failure.
    pub delay_ms: Option<f64>,
}

/// Incremental query result: parallel ordered sequences plus the next cursor.
///
/// The three sequences are index-aligned. `disconnected[i]` is `Some(1)`
/// exactly when `delay[i]` is `None`, else `None`, so a chart can render
/// outage markers without re-deriving them. `last_fetched` is the maximum
/// timestamp in the batch; an empty batch leaves the caller's cursor
/// unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleBatch {
    pub time: Vec<DateTime<Utc>>,
    pub delay: Vec<Option<f64>>,
    pub disconnected: Vec<Option<u8>>,
    pub last_fetched: Option<DateTime<Utc>>,
}

impl SampleBatch {
    /// A batch that starts from the caller's cursor.
    pub fn with_cursor(since: Option<DateTime<Utc>>) -> Self {
        Self {
            last_fetched: since,
            ..Self::default()
        }
    }

    /// Append a sample, advancing the cursor. Samples must arrive in
    /// ascending timestamp order.
    pub fn push(&mut self, sample: Sample) {
        self.disconnected
            .push(if sample.delay_ms.is_none() { Some(1) } else { None });
        self.delay.push(sample.delay_ms);
        self.last_fetched = Some(sample.ts);
        self.time.push(sample.ts);
    }

    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the batch carries no samples.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}
