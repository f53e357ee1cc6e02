//! Repository error types for registry storage operations.
//!
//! This module provides a [`RepositoryError`] enum that wraps storage-level errors
//! and adds domain-specific error variants for repository operations.

use sof_storage::StorageError;

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur during repository operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// A record or relation endpoint does not exist.
    ///
    /// This is the only domain error the indexed relations raise.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transaction conflict, e.g. committing a finished transaction.
    #[error("Conflict: transaction already finished")]
    Conflict,

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored index bookkeeping disagrees with itself.
    #[error("Corrupt relation {relation}: {detail}")]
    Corrupt { relation: &'static str, detail: String },

    /// A fault injected into the storage backend.
    #[error("Injected fault: {0}")]
    Injected(String),

    /// Internal error in the storage layer.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for RepositoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => RepositoryError::Conflict,
            StorageError::Injected { message } => RepositoryError::Injected(message),
            StorageError::Internal { message } => RepositoryError::Internal(message),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_conversion() {
        let repo_err: RepositoryError = StorageError::internal("closed").into();
        assert_eq!(repo_err, RepositoryError::Internal("closed".to_string()));

        let repo_err: RepositoryError = StorageError::conflict().into();
        assert!(matches!(repo_err, RepositoryError::Conflict));

        let repo_err: RepositoryError = StorageError::injected("boom").into();
        assert_eq!(repo_err, RepositoryError::Injected("boom".to_string()));
    }

    #[test]
    fn test_error_display() {
        let err = RepositoryError::NotFound("tag 0x01".to_string());
        assert_eq!(err.to_string(), "Not found: tag 0x01");

        let err = RepositoryError::Corrupt {
            relation: "role_members",
            detail: "missing slot 3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt relation role_members: missing slot 3"
        );
    }
}
