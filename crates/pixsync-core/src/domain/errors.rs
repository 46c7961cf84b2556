//! Domain error types
//!
//! This module defines the two error enums shared across the workspace:
//! - [`DomainError`] for validation failures of domain values
//! - [`SyncError`] for failures of the transfer and reconciliation engine

use thiserror::Error;
use uuid::Uuid;

use crate::ports::blob_store::BlobStoreError;

/// Errors that can occur when constructing or validating domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid blob path format
    #[error("Invalid blob path: {0}")]
    InvalidBlobPath(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Rendering settings could not be decoded
    #[error("Invalid rendering settings: {0}")]
    InvalidSettings(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors raised by the transfer and reconciliation engine
///
/// Transfer sessions never return these to their callers; a failed session
/// surfaces its error as the terminal [`TransferEvent::Error`] instead.
/// Reconciliation and orchestration calls return them directly.
///
/// [`TransferEvent::Error`]: crate::domain::transfer::TransferEvent::Error
#[derive(Debug, Error)]
pub enum SyncError {
    /// No valid credential was available when a network call was attempted
    #[error("Unauthorized: no valid credential available")]
    Unauthorized,

    /// Cooperative cancellation was observed
    #[error("Transfer cancelled")]
    TransferCancelled,

    /// Any other network or filesystem failure during a transfer
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Reconciliation found a state that should be structurally impossible
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    /// A transfer for this identifier is already registered
    #[error("Transfer already in flight for {0}")]
    AlreadyInFlight(Uuid),

    /// The remote blob store reported an error
    #[error("Remote error: {0}")]
    Remote(BlobStoreError),

    /// The local catalog or content store reported an error
    #[error("Local storage error: {0}")]
    Local(String),

    /// A referenced item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A domain-level validation error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Wraps an adapter error from a local port (catalog, content store)
    pub fn local(err: anyhow::Error) -> Self {
        SyncError::Local(format!("{err:#}"))
    }

    /// Returns true if this error represents cooperative cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::TransferCancelled)
    }
}

impl From<BlobStoreError> for SyncError {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::Unauthorized => SyncError::Unauthorized,
            other => SyncError::Remote(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidBlobPath("/bad".to_string());
        assert_eq!(err.to_string(), "Invalid blob path: /bad");

        let id = Uuid::nil();
        let err = SyncError::AlreadyInFlight(id);
        assert_eq!(
            err.to_string(),
            "Transfer already in flight for 00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_unauthorized_blob_error_maps_to_unauthorized() {
        let err: SyncError = BlobStoreError::Unauthorized.into();
        assert!(matches!(err, SyncError::Unauthorized));
    }

    #[test]
    fn test_other_blob_errors_map_to_remote() {
        let err: SyncError = BlobStoreError::NotFound("models/x.glb".into()).into();
        match err {
            SyncError::Remote(BlobStoreError::NotFound(path)) => assert_eq!(path, "models/x.glb"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_local_wraps_context_chain() {
        let err = anyhow::anyhow!("disk unplugged").context("Failed to list project");
        let err = SyncError::local(err);
        assert_eq!(
            err.to_string(),
            "Local storage error: Failed to list project: disk unplugged"
        );
    }

    #[test]
    fn test_is_cancelled() {
        assert!(SyncError::TransferCancelled.is_cancelled());
        assert!(!SyncError::Unauthorized.is_cancelled());
    }
}
