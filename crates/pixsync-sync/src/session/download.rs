//! Download strategy: blob store content to a local file

use std::path::PathBuf;
use std::sync::Arc;

use pixsync_core::domain::{BlobPath, SyncError, TransferKind};
use pixsync_core::ports::IBlobStore;
use tracing::debug;

use super::{TransferContext, TransferStrategy};
use crate::filesystem::write_atomic;

/// Reads one blob and writes it atomically to a destination file
pub struct DownloadSession {
    store: Arc<dyn IBlobStore>,
    path: BlobPath,
    destination: PathBuf,
}

impl DownloadSession {
    pub fn new(store: Arc<dyn IBlobStore>, path: BlobPath, destination: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path,
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }
}

#[async_trait::async_trait]
impl TransferStrategy for DownloadSession {
    fn kind(&self) -> TransferKind {
        TransferKind::Download
    }

    fn blob_path(&self) -> &BlobPath {
        &self.path
    }

    async fn execute(&self, ctx: &TransferContext) -> Result<(), SyncError> {
        ctx.checkpoint()?;

        let data = ctx
            .guard(self.store.get_bytes(&self.path, Some(ctx.progress_fn())))
            .await??;

        ctx.checkpoint()?;
        debug!(
            path = %self.path,
            destination = %self.destination.display(),
            bytes = data.len(),
            "Writing downloaded content"
        );
        ctx.guard(write_atomic(&self.destination, &data)).await??;
        Ok(())
    }
}
