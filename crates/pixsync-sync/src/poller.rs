//! Remote rendering job poller
//!
//! Reads `configs/requests/<id>.json` every `interval` and publishes the
//! decoded [`RenderingJobRecord`] until its status is `done` or `error`.
//! The renderer never pushes; polling the manifest is the only way to learn
//! about progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pixsync_core::domain::{BlobPath, RenderingJobRecord, SyncError};
use pixsync_core::ports::IBlobStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bounded::{CompletionBounded, UpdateSource};
use crate::observable::{BufferingPolicy, Observable, ObservableReader};

/// Default delay between two manifest reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Terminal-bounded view of one job's records
pub type JobUpdates =
    CompletionBounded<ObservableReader<RenderingJobRecord>, fn(&RenderingJobRecord) -> bool>;

/// Polls one rendering request manifest until the job is terminal
pub struct RemoteJobPoller {
    id: Uuid,
    interval: Duration,
    store: Arc<dyn IBlobStore>,
    record: Observable<RenderingJobRecord>,
    token: CancellationToken,
    started: AtomicBool,
}

impl RemoteJobPoller {
    /// Creates a poller whose record starts as a queued placeholder
    pub fn new(id: Uuid, interval: Duration, store: Arc<dyn IBlobStore>) -> Self {
        Self::with_initial(RenderingJobRecord::pending(id), id, interval, store)
    }

    /// Creates a poller starting from a record already known to the caller
    pub fn with_initial(
        initial: RenderingJobRecord,
        id: Uuid,
        interval: Duration,
        store: Arc<dyn IBlobStore>,
    ) -> Self {
        Self {
            id,
            interval,
            store,
            record: Observable::new(initial),
            token: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest published record
    pub fn current(&self) -> RenderingJobRecord {
        self.record.get()
    }

    /// Starts polling in a background task
    ///
    /// # Returns
    /// `false` if polling had already been started
    pub fn start(&self) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let id = self.id;
        let interval = self.interval;
        let store = Arc::clone(&self.store);
        let record = self.record.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            poll_until_terminal(id, interval, store, &record, &token).await;
            record.close();
        });
        true
    }

    /// Stops polling and ends every observer
    pub fn cancel(&self) {
        debug!(id = %self.id, "Cancelling job poller");
        self.token.cancel();
        self.record.close();
    }

    /// Direct subscription with a custom buffering policy
    pub fn subscribe(&self, policy: BufferingPolicy) -> JobUpdates {
        self.record
            .subscribe(policy)
            .until(RenderingJobRecord::is_terminal as fn(&RenderingJobRecord) -> bool)
    }
}

impl UpdateSource<RenderingJobRecord> for RemoteJobPoller {
    type Updates = JobUpdates;

    fn updates(&self) -> JobUpdates {
        self.subscribe(BufferingPolicy::Unbounded)
    }
}

impl Drop for RemoteJobPoller {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn fetch_record(store: &dyn IBlobStore, path: &BlobPath) -> Result<RenderingJobRecord, SyncError> {
    let bytes = store.get_bytes(path, None).await?;
    Ok(RenderingJobRecord::from_json(&bytes)?)
}

async fn poll_until_terminal(
    id: Uuid,
    interval: Duration,
    store: Arc<dyn IBlobStore>,
    record: &Observable<RenderingJobRecord>,
    token: &CancellationToken,
) {
    let path = BlobPath::request_manifest(id);
    let mut polls: u32 = 0;

    loop {
        if token.is_cancelled() {
            debug!(%id, "Job polling cancelled");
            return;
        }

        let fetched = tokio::select! {
            _ = token.cancelled() => return,
            fetched = fetch_record(store.as_ref(), &path) => fetched,
        };
        polls += 1;

        match fetched {
            Ok(latest) => {
                let terminal = latest.is_terminal();
                debug!(%id, status = %latest.status, polls, "Job manifest read");
                record.set(latest);
                if terminal {
                    info!(%id, polls, status = %record.get().status, "Rendering job finished");
                    return;
                }
            }
            Err(e) => {
                warn!(%id, error = %e, "Failed to read job manifest, giving up");
                record.set(RenderingJobRecord::failed(id));
                return;
            }
        }

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
