//! Operations
//!
//! The basic write is `W(target, f(p1, p2, ..., pn))`: the callback reads
//! its parameters through a [`ParamView`] and sets the target through a
//! [`TargetView`]. A parameter equal to the target means "the previous
//! version of the target".

use crate::error::OperationResult;
use morph_storage::{ParamView, TargetView, VarIdx};
use std::fmt;
use std::sync::OnceLock;

/// Kind of an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Observe a variable without producing a version
    Read,
    /// Produce a new version of the target
    Write,
    /// Reserved; not accepted by the scheduler
    CompareAndSet,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::CompareAndSet => write!(f, "compare-and-set"),
        }
    }
}

/// One step of a transaction
pub trait Operation: Send + Sync {
    /// Operation kind
    fn kind(&self) -> OperationKind;

    /// Label used in logs
    fn name(&self) -> &str;

    /// Variable this operation targets
    fn target(&self) -> VarIdx;

    /// Variables read by the callback, in view order (may include the target)
    fn parameters(&self) -> &[VarIdx];

    /// Parameters other than the target, without duplicates
    fn dependencies(&self) -> &[VarIdx];

    /// Run the callback against views bound by the scheduler
    fn execute(&self, target: &mut TargetView<'_>, params: &ParamView<'_>) -> OperationResult<()>;
}

/// Callback of a [`WriteOp`]
pub type WriteFn =
    dyn Fn(&mut TargetView<'_>, &ParamView<'_>) -> OperationResult<()> + Send + Sync;

/// Callback of a [`ReadOp`]
pub type ReadFn = dyn Fn(&ParamView<'_>) -> OperationResult<()> + Send + Sync;

/// Write operation: `W(target, f(params...))`
pub struct WriteOp {
    name: String,
    target: VarIdx,
    params: Vec<VarIdx>,
    dependencies: OnceLock<Vec<VarIdx>>,
    callback: Box<WriteFn>,
}

impl WriteOp {
    /// Create a write of `target` computed from `params`
    pub fn new<F>(name: impl Into<String>, target: VarIdx, params: Vec<VarIdx>, callback: F) -> Self
    where
        F: Fn(&mut TargetView<'_>, &ParamView<'_>) -> OperationResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            target,
            params,
            dependencies: OnceLock::new(),
            callback: Box::new(callback),
        }
    }
}

impl Operation for WriteOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Write
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> VarIdx {
        self.target
    }

    fn parameters(&self) -> &[VarIdx] {
        &self.params
    }

    fn dependencies(&self) -> &[VarIdx] {
        self.dependencies.get_or_init(|| {
            let mut deps: Vec<VarIdx> = Vec::with_capacity(self.params.len());
            for &p in &self.params {
                if p != self.target && !deps.contains(&p) {
                    deps.push(p);
                }
            }
            deps
        })
    }

    fn execute(&self, target: &mut TargetView<'_>, params: &ParamView<'_>) -> OperationResult<()> {
        (self.callback)(target, params)
    }
}

impl fmt::Debug for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOp")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("params", &self.params)
            .finish()
    }
}

/// Read operation
///
/// Observes its target as left by the most recent earlier write in the
/// batch. The callback sees a single parameter: the target itself.
pub struct ReadOp {
    name: String,
    target: [VarIdx; 1],
    callback: Box<ReadFn>,
}

impl ReadOp {
    /// Create a read of `target`
    pub fn new<F>(name: impl Into<String>, target: VarIdx, callback: F) -> Self
    where
        F: Fn(&ParamView<'_>) -> OperationResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            target: [target],
            callback: Box::new(callback),
        }
    }
}

impl Operation for ReadOp {
    fn kind(&self) -> OperationKind {
        OperationKind::Read
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> VarIdx {
        self.target[0]
    }

    fn parameters(&self) -> &[VarIdx] {
        &self.target
    }

    fn dependencies(&self) -> &[VarIdx] {
        &[]
    }

    fn execute(&self, _target: &mut TargetView<'_>, params: &ParamView<'_>) -> OperationResult<()> {
        (self.callback)(params)
    }
}

impl fmt::Debug for ReadOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOp")
            .field("name", &self.name)
            .field("target", &self.target[0])
            .finish()
    }
}
