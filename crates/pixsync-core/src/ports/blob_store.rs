//! Blob store port (driven/secondary port)
//!
//! This module defines the minimal remote storage capability the engine
//! needs: list, get, put and delete objects by [`BlobPath`].
//!
//! ## Design Notes
//!
//! - Unlike the local ports, errors here are classified with
//!   [`BlobStoreError`]: the engine must tell a missing credential apart from
//!   a missing object or a transport failure.
//! - Progress callbacks receive `(bytes_done, bytes_total)`. `bytes_total`
//!   is 0 when the remote side did not announce a length.

use bytes::Bytes;
use thiserror::Error;

use crate::domain::newtypes::BlobPath;
use crate::domain::rendering::RenderingJobRecord;

/// Progress callback reporting `(bytes_done, bytes_total)`
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

// ============================================================================
// BlobStoreError
// ============================================================================

/// Errors reported by blob store adapters
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlobStoreError {
    /// No credential was available, or the remote side rejected it
    #[error("Unauthorized request")]
    Unauthorized,

    /// The object does not exist
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The remote side answered with an unexpected status code
    #[error("Unexpected status {status} for {path}")]
    Status { status: u16, path: String },

    /// The request could not be completed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote side answered with a body that could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BlobStoreError {
    /// Classifies an HTTP-like status code
    pub fn from_status(status: u16, path: impl Into<String>) -> Self {
        let path = path.into();
        match status {
            401 | 403 => BlobStoreError::Unauthorized,
            404 => BlobStoreError::NotFound(path),
            _ => BlobStoreError::Status { status, path },
        }
    }
}

// ============================================================================
// IBlobStore trait
// ============================================================================

/// Port trait for remote blob storage
///
/// Paths are always relative, e.g. `models/<id>.glb`. Listing returns every
/// object under a prefix, regardless of nesting depth.
#[async_trait::async_trait]
pub trait IBlobStore: Send + Sync {
    /// Lists every object under `prefix`
    ///
    /// # Arguments
    /// * `prefix` - Path prefix without a trailing slash, e.g. `renders/images/<id>`
    ///
    /// # Returns
    /// The full paths of all objects found. A missing prefix yields an empty list.
    async fn list_files(&self, prefix: &str) -> Result<Vec<BlobPath>, BlobStoreError>;

    /// Downloads an object's bytes
    ///
    /// # Arguments
    /// * `path` - The object to read
    /// * `progress` - Optional callback reporting (bytes_received, content_length)
    async fn get_bytes(
        &self,
        path: &BlobPath,
        progress: Option<ProgressFn>,
    ) -> Result<Bytes, BlobStoreError>;

    /// Uploads bytes, replacing any existing object
    ///
    /// # Arguments
    /// * `path` - The object to write
    /// * `data` - The full payload
    /// * `progress` - Optional callback reporting (bytes_sent, bytes_expected)
    async fn put_bytes(
        &self,
        path: &BlobPath,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<(), BlobStoreError>;

    /// Deletes an object
    ///
    /// # Returns
    /// `true` if the remote side confirmed the deletion
    async fn delete_file(&self, path: &BlobPath) -> Result<bool, BlobStoreError>;
}

// ============================================================================
// IRenderQueue trait
// ============================================================================

/// Port trait for notifying the remote renderer of a new request
#[async_trait::async_trait]
pub trait IRenderQueue: Send + Sync {
    /// Announces a request whose manifest has already been written
    ///
    /// # Returns
    /// `true` if the queue accepted the request
    async fn submit(&self, record: &RenderingJobRecord) -> Result<bool, BlobStoreError>;
}
