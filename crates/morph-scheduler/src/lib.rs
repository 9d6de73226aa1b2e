//! # morph-scheduler
//!
//! Task precedence graph scheduling for Morph.
//!
//! A batch of transactions is decomposed into one node per operation.
//! Nodes are linked three ways:
//! - temporal chain: per-variable order by transaction timestamp
//! - local chain: per-transaction order, walked during aborts
//! - parameter dependencies: a write notifies every later node reading it
//!
//! The graph is then executed by one worker per root partition. Workers
//! walk their variable's temporal chain depth-first, stack the nodes they
//! unblock, optionally hand work to idle peers, and cascade aborts with
//! storage rollback when an operation rejects.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod coordinator;
mod error;
mod executor;
mod graph;
mod metrics;
mod node;
mod report;
mod scheduler;

pub use config::{ExecutionMode, SchedulerConfig, DEFAULT_NOTIFY_THRESHOLD};
pub use error::{SchedulerError, SchedulerResult};
pub use graph::TaskGraph;
pub use metrics::{Histogram, MetricsSnapshot, SchedulerMetrics};
pub use node::{GraphNode, NodeId, NodeStatus};
pub use report::{RunReport, WorkerStats};
pub use scheduler::Scheduler;
