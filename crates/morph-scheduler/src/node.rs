//! Graph nodes
//!
//! Nodes live in one arena owned by the graph and refer to each other by
//! [`NodeId`]. The fields mutated during execution (status, pending count,
//! notification slot) are atomics; everything else is fixed at build time.

use morph_storage::{VarIdx, Version};
use morph_types::{Operation, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Index of a node in the graph arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Create a new node ID
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Arena index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a node
///
/// `Blocked -> Occupied -> Executing -> Executed`; roots start `Ready`.
/// Any state may move to `Aborted` when the owning transaction rolls back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeStatus {
    /// Waiting for dependencies
    Blocked = 1,
    /// No dependencies at construction time
    Ready = 2,
    /// Claimed by a worker, queued to run
    Occupied = 3,
    /// Callback running
    Executing = 4,
    /// Callback finished successfully
    Executed = 5,
    /// Owning transaction rolled back
    Aborted = 6,
}

impl NodeStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Blocked,
            2 => Self::Ready,
            3 => Self::Occupied,
            4 => Self::Executing,
            5 => Self::Executed,
            _ => Self::Aborted,
        }
    }
}

const NO_WORKER: usize = 0;

/// Execution-time wrapper around one operation
pub struct GraphNode {
    pub(crate) op: Box<dyn Operation>,
    pub(crate) txn: usize,
    pub(crate) timestamp: Timestamp,
    pub(crate) temporal_next: Option<NodeId>,
    pub(crate) param_dependents: Vec<NodeId>,
    pub(crate) required_versions: Vec<Version>,
    pub(crate) local_prev: Option<NodeId>,
    status: AtomicU8,
    pending: AtomicUsize,
    /// Worker index + 1 of an idle worker waiting for this node
    notify: AtomicUsize,
}

impl GraphNode {
    pub(crate) fn new(
        op: Box<dyn Operation>,
        txn: usize,
        timestamp: Timestamp,
        local_prev: Option<NodeId>,
    ) -> Self {
        let required_versions = vec![0; op.parameters().len()];
        Self {
            op,
            txn,
            timestamp,
            temporal_next: None,
            param_dependents: Vec::new(),
            required_versions,
            local_prev,
            status: AtomicU8::new(NodeStatus::Blocked as u8),
            pending: AtomicUsize::new(0),
            notify: AtomicUsize::new(NO_WORKER),
        }
    }

    /// Set the dependency count and the matching initial status
    pub(crate) fn seal(&mut self, pending: usize) {
        let status = if pending == 0 {
            NodeStatus::Ready
        } else {
            NodeStatus::Blocked
        };
        *self.pending.get_mut() = pending;
        *self.status.get_mut() = status as u8;
    }

    /// The operation this node runs
    pub fn operation(&self) -> &dyn Operation {
        self.op.as_ref()
    }

    /// Operation name
    pub fn name(&self) -> &str {
        self.op.name()
    }

    /// Target variable
    pub fn target(&self) -> VarIdx {
        self.op.target()
    }

    /// Timestamp of the owning transaction
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Index of the owning transaction in timestamp order
    pub fn transaction(&self) -> usize {
        self.txn
    }

    /// Next node on the same variable
    pub fn temporal_next(&self) -> Option<NodeId> {
        self.temporal_next
    }

    /// Previous node in the same transaction
    pub fn local_prev(&self) -> Option<NodeId> {
        self.local_prev
    }

    /// Nodes reading the value this node writes
    pub fn param_dependents(&self) -> &[NodeId] {
        &self.param_dependents
    }

    /// Version read for each parameter
    pub fn required_versions(&self) -> &[Version] {
        &self.required_versions
    }

    /// Whether this node reads `version` of `variable`
    pub fn reads_version(&self, variable: VarIdx, version: Version) -> bool {
        self.op
            .parameters()
            .iter()
            .zip(&self.required_versions)
            .any(|(&p, &v)| p == variable && v == version)
    }

    /// Current status
    pub fn status(&self) -> NodeStatus {
        NodeStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Unsatisfied dependency count
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Check if the node was aborted
    pub fn is_aborted(&self) -> bool {
        self.status() == NodeStatus::Aborted
    }

    /// Worker registered to receive this node, if any
    pub fn notify_slot(&self) -> Option<usize> {
        match self.notify.load(Ordering::Acquire) {
            NO_WORKER => None,
            w => Some(w - 1),
        }
    }

    /// Satisfy one dependency; true for the caller that satisfies the last
    pub(crate) fn release(&self) -> bool {
        let prev = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "dependency count underflow");
        prev == 1
    }

    /// `Blocked -> Occupied`; aborted nodes keep their status
    pub(crate) fn claim(&self) {
        let _ = self.status.compare_exchange(
            NodeStatus::Blocked as u8,
            NodeStatus::Occupied as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Move to `Executing`
    ///
    /// Returns `Ok(false)` if the node was aborted before it started, and
    /// the offending status if it already ran.
    pub(crate) fn try_start(&self) -> Result<bool, NodeStatus> {
        loop {
            let current = self.status();
            match current {
                NodeStatus::Ready | NodeStatus::Occupied => {
                    if self
                        .status
                        .compare_exchange(
                            current as u8,
                            NodeStatus::Executing as u8,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok()
                    {
                        return Ok(true);
                    }
                }
                NodeStatus::Aborted => return Ok(false),
                other => return Err(other),
            }
        }
    }

    /// `Executing -> Executed`; false if an abort raced in
    pub(crate) fn finish(&self) -> bool {
        self.status
            .compare_exchange(
                NodeStatus::Executing as u8,
                NodeStatus::Executed as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Mark aborted, returning the previous status
    pub(crate) fn abort(&self) -> NodeStatus {
        NodeStatus::from_u8(self.status.swap(NodeStatus::Aborted as u8, Ordering::SeqCst))
    }

    /// Ask to be handed this node once it unblocks
    pub(crate) fn register_interest(&self, worker: usize) -> bool {
        self.notify
            .compare_exchange(NO_WORKER, worker + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("name", &self.name())
            .field("target", &self.target())
            .field("timestamp", &self.timestamp)
            .field("status", &self.status())
            .field("pending", &self.pending())
            .finish()
    }
}
