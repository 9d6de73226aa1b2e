//! Operation error types

use morph_storage::StorageError;
use thiserror::Error;

/// Errors returned by operation callbacks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Business-logic rejection; the owning transaction is aborted
    #[error("operation rejected: {0}")]
    Rejected(String),

    /// Storage invariant violated while reading or writing a view
    #[error("storage invariant violated: {0}")]
    Storage(#[from] StorageError),
}

impl OperationError {
    /// Create a business-logic rejection
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Whether the error must stop the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type for operation callbacks
pub type OperationResult<T> = Result<T, OperationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_is_not_fatal() {
        let err = OperationError::rejected("insufficient balance");
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "operation rejected: insufficient balance");
    }

    #[test]
    fn test_storage_error_is_fatal() {
        let err: OperationError = StorageError::VersionNotFound {
            variable: 0,
            version: 9,
        }
        .into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("never written"));
    }
}
