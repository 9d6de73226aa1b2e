//! Storage error types

use crate::{VarIdx, Version};
use thiserror::Error;

/// Storage errors
///
/// None of these occur when the graph was built correctly; they surface
/// construction or scheduling bugs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Variable index outside the schema
    #[error("unknown variable {variable} (schema has {schema} variables)")]
    UnknownVariable {
        /// Requested index
        variable: VarIdx,
        /// Schema size
        schema: usize,
    },

    /// Version was never written for this variable
    #[error("version {version} of variable {variable} was never written")]
    VersionNotFound {
        /// Variable index
        variable: VarIdx,
        /// Requested version
        version: Version,
    },

    /// Parameter index outside a view
    #[error("parameter {index} out of range (view has {len} parameters)")]
    ParameterOutOfRange {
        /// Requested parameter index
        index: usize,
        /// Number of parameters in the view
        len: usize,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
