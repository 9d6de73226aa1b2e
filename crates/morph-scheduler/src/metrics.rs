//! Execution metrics
//!
//! Counters are shared by all workers of a run and may be shared across
//! runs through [`Scheduler`](crate::Scheduler).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Histogram of callback latencies in microseconds
pub struct Histogram {
    buckets: Vec<u64>,
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    /// Create histogram with default buckets
    pub fn new() -> Self {
        Self::with_buckets(vec![1, 5, 10, 50, 100, 500, 1_000, 5_000, 10_000])
    }

    /// Create histogram with custom upper bounds
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = (0..=buckets.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Record a value
    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);

        // Last slot counts values above every bound
        let slot = self
            .buckets
            .iter()
            .position(|&bound| value <= bound)
            .unwrap_or(self.buckets.len());
        self.counts[slot].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a duration in microseconds
    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(elapsed.as_micros() as u64);
    }

    /// Get mean value
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Largest value seen
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Get total count
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// `(upper bound, count)` pairs; `None` is the overflow bucket
    pub fn buckets(&self) -> Vec<(Option<u64>, u64)> {
        self.buckets
            .iter()
            .map(|&b| Some(b))
            .chain(std::iter::once(None))
            .zip(&self.counts)
            .map(|(bound, c)| (bound, c.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters maintained by the executor
#[derive(Default)]
pub struct SchedulerMetrics {
    nodes_executed: AtomicU64,
    nodes_skipped: AtomicU64,
    nodes_aborted: AtomicU64,
    txns_aborted: AtomicU64,
    handoffs: AtomicU64,
    runs: AtomicU64,
    exec_time: Histogram,
}

impl SchedulerMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_executed(&self, elapsed: Duration) {
        self.nodes_executed.fetch_add(1, Ordering::Relaxed);
        self.exec_time.observe_duration(elapsed);
    }

    pub(crate) fn record_skipped(&self) {
        self.nodes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_aborted_nodes(&self, count: u64) {
        self.nodes_aborted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_aborted_txn(&self) {
        self.txns_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handoff(&self) {
        self.handoffs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Callback latency histogram
    pub fn exec_time(&self) -> &Histogram {
        &self.exec_time
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            nodes_executed: self.nodes_executed.load(Ordering::Relaxed),
            nodes_skipped: self.nodes_skipped.load(Ordering::Relaxed),
            nodes_aborted: self.nodes_aborted.load(Ordering::Relaxed),
            txns_aborted: self.txns_aborted.load(Ordering::Relaxed),
            handoffs: self.handoffs.load(Ordering::Relaxed),
            exec_mean_us: self.exec_time.mean(),
            exec_max_us: self.exec_time.max(),
        }
    }
}

/// Snapshot of [`SchedulerMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Completed graph runs
    pub runs: u64,
    /// Callbacks that ran to completion
    pub nodes_executed: u64,
    /// Nodes completed without running because they were aborted
    pub nodes_skipped: u64,
    /// Nodes marked aborted by cascades
    pub nodes_aborted: u64,
    /// Transactions rolled back
    pub txns_aborted: u64,
    /// Nodes handed to idle workers
    pub handoffs: u64,
    /// Mean callback latency (µs)
    pub exec_mean_us: f64,
    /// Slowest callback (µs)
    pub exec_max_us: u64,
}

impl MetricsSnapshot {
    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
