//! Versioned store implementation
//!
//! Every variable owns an ordered version history. Writes never collide
//! across variables, and two writers of the same variable are serialized
//! by the graph, so each chain sits behind its own lock.

use crate::error::{StorageError, StorageResult};
use crate::{Value, VarIdx, Version, BASE_VERSION};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::trace;

/// One entry in a variable's history
#[derive(Clone, Copy, Debug)]
struct Entry {
    value: Value,
    /// False once the producing transaction was reverted
    live: bool,
}

/// Version history of a single variable
#[derive(Debug)]
struct VersionChain {
    committed: Value,
    history: BTreeMap<Version, Entry>,
    latest: Version,
}

impl VersionChain {
    fn new(committed: Value) -> Self {
        let mut history = BTreeMap::new();
        history.insert(
            BASE_VERSION,
            Entry {
                value: committed,
                live: true,
            },
        );
        Self {
            committed,
            history,
            latest: BASE_VERSION,
        }
    }

    fn write(&mut self, version: Version, value: Value) {
        self.history.insert(version, Entry { value, live: true });
        if version > self.latest {
            self.latest = version;
        }
    }

    fn revert(&mut self, timestamp: Version) -> bool {
        let Some(entry) = self.history.get_mut(&timestamp) else {
            return false;
        };
        entry.live = false;
        if self.latest != timestamp {
            return false;
        }
        // The base version is always live, so this finds something.
        self.latest = self
            .history
            .range(..timestamp)
            .rev()
            .find(|(_, e)| e.live)
            .map(|(v, _)| *v)
            .unwrap_or(BASE_VERSION);
        true
    }

    fn commit(&mut self) {
        if let Some(entry) = self.history.get(&self.latest) {
            self.committed = entry.value;
        }
        *self = Self::new(self.committed);
    }
}

/// Multi-version store with a fixed schema
///
/// Variables are identified by index. Each has an implicit version `0`
/// holding its committed value; transactions add versions keyed by their
/// timestamp. Stale versions left by reverted transactions stay readable
/// until the next [`commit`](Self::commit).
#[derive(Debug, Default)]
pub struct VersionedStore {
    chains: Vec<RwLock<VersionChain>>,
}

impl VersionedStore {
    /// Create a store of `schema` variables, all zero at version 0
    pub fn new(schema: usize) -> Self {
        Self::with_values(vec![0; schema])
    }

    /// Create a store whose committed values are `values`
    pub fn with_values(values: Vec<Value>) -> Self {
        Self {
            chains: values
                .into_iter()
                .map(|v| RwLock::new(VersionChain::new(v)))
                .collect(),
        }
    }

    /// Reset the store to `schema` zeroed variables
    pub fn init(&mut self, schema: usize) {
        *self = Self::new(schema);
    }

    /// Number of variables in the schema
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Check if the schema is empty
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    fn chain(&self, variable: VarIdx) -> StorageResult<&RwLock<VersionChain>> {
        self.chains
            .get(variable)
            .ok_or(StorageError::UnknownVariable {
                variable,
                schema: self.chains.len(),
            })
    }

    /// Read `variable` as of `version`
    pub fn read(&self, version: Version, variable: VarIdx) -> StorageResult<Value> {
        self.chain(variable)?
            .read()
            .history
            .get(&version)
            .map(|e| e.value)
            .ok_or(StorageError::VersionNotFound { variable, version })
    }

    /// Write `value` as version `version` of `variable`
    ///
    /// Advances the latest-version cursor when `version` is newer.
    pub fn write(&self, version: Version, variable: VarIdx, value: Value) -> StorageResult<()> {
        self.chain(variable)?.write().write(version, value);
        trace!(variable, version, value, "version written");
        Ok(())
    }

    /// Latest-version cursor of `variable`
    pub fn latest_version(&self, variable: VarIdx) -> StorageResult<Version> {
        Ok(self.chain(variable)?.read().latest)
    }

    /// Value at the latest-version cursor of `variable`
    pub fn latest_value(&self, variable: VarIdx) -> StorageResult<Value> {
        let chain = self.chain(variable)?.read();
        chain
            .history
            .get(&chain.latest)
            .map(|e| e.value)
            .ok_or(StorageError::VersionNotFound {
                variable,
                version: chain.latest,
            })
    }

    /// Committed value of `variable`
    pub fn committed(&self, variable: VarIdx) -> StorageResult<Value> {
        Ok(self.chain(variable)?.read().committed)
    }

    /// Live versions of `variable` in ascending order
    pub fn versions(&self, variable: VarIdx) -> StorageResult<Vec<Version>> {
        Ok(self
            .chain(variable)?
            .read()
            .history
            .iter()
            .filter(|(_, e)| e.live)
            .map(|(v, _)| *v)
            .collect())
    }

    /// Roll back every version produced at `timestamp`
    ///
    /// Variables whose cursor sits at `timestamp` move back to their
    /// newest live version below it. Returns the number of cursors moved.
    pub fn revert(&self, timestamp: Version) -> usize {
        if timestamp == BASE_VERSION {
            return 0;
        }
        let mut moved = 0;
        for chain in &self.chains {
            if chain.write().revert(timestamp) {
                moved += 1;
            }
        }
        trace!(timestamp, moved, "timestamp reverted");
        moved
    }

    /// Fold every cursor into the committed slot and drop the history
    pub fn commit(&self) {
        for chain in &self.chains {
            chain.write().commit();
        }
    }

    /// Commit, then return the committed values in variable order
    pub fn dump(&self) -> Vec<Value> {
        self.commit();
        self.chains.iter().map(|c| c.read().committed).collect()
    }
}
