//! PixSync Cloud - Web API blob store adapter
//!
//! Provides async access to the renderer's web API:
//! - Signed-URL (SAS) issuance for blob reads and writes
//! - Prefix listings of user resources
//! - Blob deletion
//! - Renderer queue notification
//!
//! ## Modules
//!
//! - [`client`] - HTTP client for the web API and signed-URL transfers
//! - [`provider`] - `IBlobStore` / `IRenderQueue` implementation over the client

pub mod client;
pub mod provider;

use pixsync_core::ports::BlobStoreError;
use thiserror::Error;

/// Errors that can occur when talking to the web API or a signed URL
#[derive(Debug, Error)]
pub enum CloudError {
    /// No id token is configured, or the API rejected it
    #[error("Unauthorized request")]
    Unauthorized,

    /// The requested blob does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server answered with an unexpected status
    #[error("Unexpected status {status} from {endpoint}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Endpoint or blob the request was for
        endpoint: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API returned something that is not a usable URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The API response could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<CloudError> for BlobStoreError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Unauthorized => BlobStoreError::Unauthorized,
            CloudError::NotFound(path) => BlobStoreError::NotFound(path),
            CloudError::Status { status, endpoint } => BlobStoreError::Status {
                status,
                path: endpoint,
            },
            CloudError::Network(e) => BlobStoreError::Transport(e.to_string()),
            CloudError::InvalidUrl(msg) | CloudError::InvalidResponse(msg) => {
                BlobStoreError::InvalidResponse(msg)
            }
        }
    }
}
