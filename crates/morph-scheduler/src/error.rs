//! Error types for the scheduler

use crate::node::{NodeId, NodeStatus};
use morph_storage::{StorageError, VarIdx};
use morph_types::{OperationKind, Timestamp};
use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Transaction without operations
    #[error("transaction at timestamp {0} has no operations")]
    EmptyTransaction(Timestamp),

    /// Timestamp 0 is the committed version of every variable
    #[error("timestamp 0 is reserved for committed state")]
    ReservedTimestamp,

    /// Two transactions share a timestamp
    #[error("duplicate transaction timestamp {0}")]
    DuplicateTimestamp(Timestamp),

    /// Operation refers to a variable outside the store schema
    #[error("operation {operation:?} refers to unknown variable {variable} (schema has {schema})")]
    UnknownVariable {
        /// Operation name
        operation: String,
        /// Offending index
        variable: VarIdx,
        /// Store schema size
        schema: usize,
    },

    /// Operation kind the engine cannot schedule
    #[error("operation {operation:?} has unsupported kind {kind}")]
    UnsupportedOperation {
        /// Operation name
        operation: String,
        /// Its kind
        kind: OperationKind,
    },

    /// Unknown execution strategy
    #[error("unsupported execution mode {0:?}")]
    UnsupportedMode(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Write callback returned without setting its target
    #[error("operation {operation:?} at timestamp {timestamp} did not write variable {variable}")]
    MissingTargetWrite {
        /// Operation name
        operation: String,
        /// Node timestamp
        timestamp: Timestamp,
        /// Target variable
        variable: VarIdx,
    },

    /// Node reached execution from an unexpected state
    #[error("node {node:?} cannot start executing from {status:?}")]
    InvalidTransition {
        /// Node
        node: NodeId,
        /// Status found
        status: NodeStatus,
    },

    /// Storage invariant violated during execution
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A worker thread panicked
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    /// Every worker is idle but nodes are still pending
    #[error("execution stalled with {remaining} nodes pending")]
    Stalled {
        /// Nodes neither executed nor skipped
        remaining: usize,
    },

    /// The graph was already executed
    #[error("graph has already been executed")]
    AlreadyExecuted,
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
