//! Upload strategy: local content to the blob store

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use pixsync_core::domain::{BlobPath, SyncError, TransferKind};
use pixsync_core::ports::IBlobStore;
use tracing::debug;

use super::{TransferContext, TransferStrategy};

/// What an upload sends
#[derive(Debug, Clone)]
pub enum UploadPayload {
    /// Bytes already in memory
    Bytes(Bytes),
    /// A local file, read when the transfer starts
    File(PathBuf),
}

/// Writes one payload to one blob path
pub struct UploadSession {
    store: Arc<dyn IBlobStore>,
    path: BlobPath,
    payload: UploadPayload,
}

impl UploadSession {
    pub fn new(store: Arc<dyn IBlobStore>, path: BlobPath, payload: UploadPayload) -> Self {
        Self {
            store,
            path,
            payload,
        }
    }
}

#[async_trait::async_trait]
impl TransferStrategy for UploadSession {
    fn kind(&self) -> TransferKind {
        TransferKind::Upload
    }

    fn blob_path(&self) -> &BlobPath {
        &self.path
    }

    async fn execute(&self, ctx: &TransferContext) -> Result<(), SyncError> {
        ctx.checkpoint()?;

        let data = match &self.payload {
            UploadPayload::Bytes(bytes) => bytes.clone(),
            UploadPayload::File(path) => {
                debug!(path = %path.display(), "Reading upload payload");
                Bytes::from(ctx.guard(tokio::fs::read(path)).await??)
            }
        };

        ctx.checkpoint()?;
        debug!(path = %self.path, bytes = data.len(), "Uploading");
        ctx.guard(self.store.put_bytes(&self.path, data, Some(ctx.progress_fn())))
            .await??;
        Ok(())
    }
}
