//! Run reports

use crate::config::ExecutionMode;
use morph_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-worker counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Worker index
    pub worker: usize,
    /// Callbacks run
    pub executed: usize,
    /// Aborted nodes completed without running
    pub skipped: usize,
    /// Nodes this worker handed to idle peers
    pub handed_off: usize,
    /// Nodes received from peers
    pub received: usize,
    /// Transactions this worker rolled back
    pub aborts_started: usize,
}

/// Outcome of executing one graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Traversal strategy used
    pub mode: ExecutionMode,
    /// Number of workers spawned
    pub workers: usize,
    /// Total nodes in the graph
    pub nodes: usize,
    /// Callbacks run to completion
    pub executed: usize,
    /// Nodes completed without running
    pub skipped: usize,
    /// Nodes in aborted state at the end
    pub aborted: usize,
    /// Nodes handed to idle workers
    pub handoffs: usize,
    /// Timestamps of rolled-back transactions, ascending
    pub aborted_transactions: Vec<Timestamp>,
    /// Wall-clock time of the run
    #[serde(with = "duration_micros")]
    pub elapsed: Duration,
    /// Per-worker breakdown
    pub worker_stats: Vec<WorkerStats>,
}

impl RunReport {
    /// Check if every transaction committed
    pub fn is_clean(&self) -> bool {
        self.aborted_transactions.is_empty()
    }

    /// Export report as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

mod duration_micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_micros() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_micros)
    }
}
