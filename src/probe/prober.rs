//! Per-target TCP sampling loop.
//!
//! Measures TCP handshake latency to a single target at a fixed cadence and
//! writes one sample per attempt, `None` when the connect failed.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::probe::Target;
use crate::storage::SampleStore;

/// Fixed delay between attempts.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(1000);

/// Fixed TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Extra attempts granted past a configured maximum, so the tail of the
/// series still reflects state changes landing just before the loop winds
/// down.
const ATTEMPT_GRACE: u32 = 2;

/// One independent sampling loop bound to a single target.
///
/// Every attempt emits exactly one sample: the elapsed handshake time in
/// milliseconds on success (no data is exchanged), or `None` when the connect
/// timed out or failed at the OS level — DNS failures fold into the same
/// surface. Expected network failures never escape the loop; a failed store
/// write loses that tick's sample and the loop moves on.
pub struct Prober {
    target: Target,
    store: SampleStore,
    max_attempts: Option<u32>,
    interval: Duration,
    connect_timeout: Duration,
}

impl Prober {
    /// Create an unbounded prober with the fixed cadence and timeout.
    pub fn new(target: Target, store: SampleStore) -> Self {
        Self {
            target,
            store,
            max_attempts: None,
            interval: PROBE_INTERVAL,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Bound the loop to `max + 2` attempts instead of running until
    /// cancelled.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Override the inter-attempt delay.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Run until cancelled or the attempt budget is spent.
    ///
    /// Cancellation is checked once per iteration, before a new attempt
    /// starts; an attempt already in flight always completes and records its
    /// sample, so worst-case stop latency is about the connect timeout plus
    /// one interval.
    pub async fn run(self, cancel: CancellationToken) {
        let budget = self.max_attempts.map(|n| n + ATTEMPT_GRACE);
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(target = %self.target, "Prober cancelled");
                break;
            }
            if let Some(budget) = budget
                && attempt >= budget
            {
                tracing::debug!(target = %self.target, attempts = attempt, "Attempt budget spent");
                break;
            }
            attempt += 1;

            let delay_ms = self.sample_once().await;
            if let Err(e) = self.store.insert(self.target.hostname(), delay_ms).await {
                // This tick's sample is lost; keep monitoring.
                tracing::error!(target = %self.target, error = %e, "Sample write failed");
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// One connect attempt: handshake latency in milliseconds, or `None` on
    /// timeout or connection-level error.
    async fn sample_once(&self) -> Option<f64> {
        let addr = self.target.socket_addr();

        let start = Instant::now();
        match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                let elapsed = start.elapsed();
                drop(stream);
                let ms = elapsed.as_secs_f64() * 1000.0;
                tracing::debug!(target = %self.target, latency_ms = ms, "Probe connected");
                Some(ms)
            }
            Ok(Err(e)) => {
                tracing::debug!(target = %self.target, error = %e, "Probe failed");
                None
            }
            Err(_) => {
                tracing::debug!(
                    target = %self.target,
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "Probe timed out"
                );
                None
            }
        }
    }
}
