//! WebApiBlobStore - IBlobStore and IRenderQueue over the renderer web API
//!
//! Wraps the [`WebApiClient`] to fulfil the blob store and render queue port
//! contracts.
//!
//! ## Design Notes
//!
//! - Uses `tokio::sync::RwLock` because the port methods take `&self` while
//!   replacing the id token needs `&mut WebApiClient`. Transfers only take
//!   the read lock, so they run concurrently.
//! - The listing endpoint may return bare file names or full blob paths;
//!   bare names are resolved against the listed prefix.

use bytes::Bytes;
use pixsync_core::domain::{BlobPath, RenderingJobRecord};
use pixsync_core::ports::{BlobStoreError, IBlobStore, IRenderQueue, ProgressFn};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::client::WebApiClient;

/// Resolves one listed name to a blob path under `prefix`
fn resolve_listed_name(prefix: &str, name: &str) -> Option<BlobPath> {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    let candidate = if name.contains('/') || prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    };

    match BlobPath::new(candidate) {
        Ok(path) if path.starts_with(prefix) => Some(path),
        Ok(path) => {
            debug!(%path, prefix, "Listed blob outside prefix, skipping");
            None
        }
        Err(e) => {
            warn!(name, error = %e, "Skipping unusable listed name");
            None
        }
    }
}

// ============================================================================
// WebApiBlobStore
// ============================================================================

/// Blob store and render queue backed by the renderer web API
pub struct WebApiBlobStore {
    client: RwLock<WebApiClient>,
}

impl WebApiBlobStore {
    /// Creates a new `WebApiBlobStore` wrapping the given [`WebApiClient`]
    pub fn new(client: WebApiClient) -> Self {
        Self {
            client: RwLock::new(client),
        }
    }

    /// Replaces the id token used by later requests
    pub async fn set_id_token(&self, id_token: Option<String>) {
        self.client.write().await.set_id_token(id_token);
    }
}

#[async_trait::async_trait]
impl IBlobStore for WebApiBlobStore {
    #[instrument(skip(self))]
    async fn list_files(&self, prefix: &str) -> Result<Vec<BlobPath>, BlobStoreError> {
        let names = self.client.read().await.list_resources(prefix).await?;

        let mut paths: Vec<BlobPath> = names
            .iter()
            .filter_map(|name| resolve_listed_name(prefix, name))
            .collect();
        paths.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        paths.dedup();

        debug!(count = paths.len(), "Blobs listed");
        Ok(paths)
    }

    #[instrument(skip(self, progress), fields(path = %path))]
    async fn get_bytes(
        &self,
        path: &BlobPath,
        progress: Option<ProgressFn>,
    ) -> Result<Bytes, BlobStoreError> {
        let client = self.client.read().await;
        Ok(client.get_blob(path.as_str(), progress).await?)
    }

    #[instrument(skip(self, data, progress), fields(path = %path, bytes = data.len()))]
    async fn put_bytes(
        &self,
        path: &BlobPath,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<(), BlobStoreError> {
        let client = self.client.read().await;
        Ok(client.put_blob(path.as_str(), data, progress).await?)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete_file(&self, path: &BlobPath) -> Result<bool, BlobStoreError> {
        let client = self.client.read().await;
        Ok(client.delete_blob(path.as_str()).await?)
    }
}

#[async_trait::async_trait]
impl IRenderQueue for WebApiBlobStore {
    #[instrument(skip(self, record), fields(request = %record.id))]
    async fn submit(&self, record: &RenderingJobRecord) -> Result<bool, BlobStoreError> {
        let client = self.client.read().await;
        Ok(client.notify_renderer_queue(record).await?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bare_name() {
        let path = resolve_listed_name("renders/images/abc", "a.png").unwrap();
        assert_eq!(path.as_str(), "renders/images/abc/a.png");
    }

    #[test]
    fn test_resolve_full_path() {
        let path = resolve_listed_name("renders/images/abc", "renders/images/abc/a.png").unwrap();
        assert_eq!(path.as_str(), "renders/images/abc/a.png");
    }

    #[test]
    fn test_resolve_rejects_paths_outside_prefix() {
        assert!(resolve_listed_name("renders/images/abc", "renders/images/abcd/a.png").is_none());
        assert!(resolve_listed_name("models", "../secret").is_none());
    }
}
