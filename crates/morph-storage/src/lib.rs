//! # morph-storage
//!
//! Multi-version in-memory storage for Morph.
//!
//! This crate provides:
//! - A fixed-schema store where every variable keeps a version history
//!   keyed by transaction timestamp
//! - Commit and per-timestamp rollback of the latest-version cursor
//! - Target/parameter views handed to operation callbacks

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod store;
mod view;

pub use error::{StorageError, StorageResult};
pub use store::VersionedStore;
pub use view::{ParamView, TargetView};

/// Value held by a variable
pub type Value = i64;

/// Logical timestamp of the transaction that produced a version
pub type Version = u64;

/// Index of a variable in the schema
pub type VarIdx = usize;

/// Version every variable starts from (the committed value)
pub const BASE_VERSION: Version = 0;
