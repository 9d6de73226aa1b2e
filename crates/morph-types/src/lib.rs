//! # morph-types
//!
//! Operation and transaction model for Morph.
//!
//! A transaction is an ordered list of operations sharing one logical
//! timestamp. Each operation targets one variable, declares the variables
//! it reads, and carries the callback that computes its effect.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod operation;
mod transaction;

pub use error::{OperationError, OperationResult};
pub use operation::{Operation, OperationKind, ReadFn, ReadOp, WriteFn, WriteOp};
pub use transaction::{Timestamp, Transaction};
