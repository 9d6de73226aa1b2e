//! Transactions

use crate::operation::Operation;
use morph_storage::Version;
use std::fmt;

/// Logical timestamp of a transaction; doubles as the version it writes
pub type Timestamp = Version;

/// An ordered list of operations executed at one timestamp
pub struct Transaction {
    timestamp: Timestamp,
    operations: Vec<Box<dyn Operation>>,
}

impl Transaction {
    /// Create an empty transaction at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            operations: Vec::new(),
        }
    }

    /// Append an operation (builder style)
    pub fn with(mut self, op: impl Operation + 'static) -> Self {
        self.push(op);
        self
    }

    /// Append an operation
    pub fn push(&mut self, op: impl Operation + 'static) {
        self.operations.push(Box::new(op));
    }

    /// Transaction timestamp
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Operations in declared order
    pub fn operations(&self) -> &[Box<dyn Operation>] {
        &self.operations
    }

    /// Take the operations out of the transaction
    pub fn into_operations(self) -> Vec<Box<dyn Operation>> {
        self.operations
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if the transaction has no operations
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("timestamp", &self.timestamp)
            .field(
                "operations",
                &self.operations.iter().map(|op| op.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
