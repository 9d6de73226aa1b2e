//! Views handed to operation callbacks
//!
//! A callback sees exactly two capabilities: a write-only view of its
//! target at its own timestamp, and a read-only view of its parameters at
//! the versions fixed during graph construction.

use crate::error::{StorageError, StorageResult};
use crate::store::VersionedStore;
use crate::{Value, VarIdx, Version};

/// Write-only view of an operation's target variable
pub struct TargetView<'a> {
    store: &'a VersionedStore,
    version: Version,
    target: VarIdx,
    written: bool,
}

impl<'a> TargetView<'a> {
    /// Bind a view to `(version, target)`
    pub fn new(store: &'a VersionedStore, version: Version, target: VarIdx) -> Self {
        Self {
            store,
            version,
            target,
            written: false,
        }
    }

    /// Write the target at the view's version
    pub fn set(&mut self, value: Value) -> StorageResult<()> {
        self.store.write(self.version, self.target, value)?;
        self.written = true;
        Ok(())
    }

    /// Target variable index
    pub fn target(&self) -> VarIdx {
        self.target
    }

    /// Version written by [`set`](Self::set)
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether [`set`](Self::set) succeeded at least once
    pub fn is_written(&self) -> bool {
        self.written
    }
}

/// Read-only view of an operation's parameters
///
/// Parameter `i` is variable `params[i]` at version `versions[i]`.
pub struct ParamView<'a> {
    store: &'a VersionedStore,
    versions: &'a [Version],
    params: &'a [VarIdx],
}

impl<'a> ParamView<'a> {
    /// Bind a view over parallel `versions`/`params` slices
    pub fn new(store: &'a VersionedStore, versions: &'a [Version], params: &'a [VarIdx]) -> Self {
        debug_assert_eq!(versions.len(), params.len());
        Self {
            store,
            versions,
            params,
        }
    }

    /// Read parameter `index`
    pub fn get(&self, index: usize) -> StorageResult<Value> {
        let (version, variable) = self
            .versions
            .get(index)
            .zip(self.params.get(index))
            .ok_or(StorageError::ParameterOutOfRange {
                index,
                len: self.params.len(),
            })?;
        self.store.read(*version, *variable)
    }

    /// Variable behind parameter `index`
    pub fn variable(&self, index: usize) -> Option<VarIdx> {
        self.params.get(index).copied()
    }

    /// Version read for parameter `index`
    pub fn version(&self, index: usize) -> Option<Version> {
        self.versions.get(index).copied()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the view has no parameters
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
