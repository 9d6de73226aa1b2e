//! Scheduler facade
//!
//! Holds a validated configuration and metrics shared by every graph it
//! builds.

use crate::config::SchedulerConfig;
use crate::error::SchedulerResult;
use crate::graph::TaskGraph;
use crate::metrics::{MetricsSnapshot, SchedulerMetrics};
use crate::report::RunReport;
use morph_storage::VersionedStore;
use morph_types::Transaction;
use std::sync::Arc;

/// Builds and runs task graphs with one configuration
pub struct Scheduler {
    config: SchedulerConfig,
    metrics: Arc<SchedulerMetrics>,
}

impl Scheduler {
    /// Create a scheduler, validating `config`
    pub fn new(config: SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: Arc::new(SchedulerMetrics::new()),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get reference to the shared metrics
    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Snapshot of the shared metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Build the graph of `transactions`
    pub fn build(
        &self,
        store: &VersionedStore,
        transactions: Vec<Transaction>,
    ) -> SchedulerResult<TaskGraph> {
        let graph = TaskGraph::build(store, transactions, self.config.clone())?;
        Ok(graph.with_metrics(Arc::clone(&self.metrics)))
    }

    /// Build and run `transactions` in one step
    pub fn execute(
        &self,
        store: &VersionedStore,
        transactions: Vec<Transaction>,
    ) -> SchedulerResult<RunReport> {
        self.build(store, transactions)?.run(store)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            config: SchedulerConfig::default(),
            metrics: Arc::new(SchedulerMetrics::new()),
        }
    }
}
