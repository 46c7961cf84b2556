//! Transfer sessions
//!
//! A [`TransferSession`] moves one blob in one direction and publishes its
//! lifecycle as an observable sequence of [`TransferEvent`]s:
//!
//! ```text
//!                 run()                         strategy Ok
//! Initializing ──────────► Started ─► Progress* ───────────► Completed
//!      │                      │
//!      │ cancel()             │ token cancelled      strategy Err
//!      ▼                      ├───────────────► Cancelled
//!  Cancelled                  └──────────────────────────► Error(cause)
//! ```
//!
//! The network mechanics live in a [`TransferStrategy`]
//! ([`UploadSession`], [`DownloadSession`]). The session owns what is common:
//! idempotent start, the cancellation token, throttled progress and the
//! guarantee that exactly one terminal event is emitted, last.

mod download;
mod upload;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pixsync_core::domain::{BlobPath, SyncError, TransferEvent, TransferKind};
use pixsync_core::ports::{IBlobStore, ProgressFn};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bounded::{CompletionBounded, UpdateSource};
use crate::observable::{BufferingPolicy, Observable, ObservableReader};

pub use download::DownloadSession;
pub use upload::{UploadPayload, UploadSession};

/// Terminal-bounded view of one session's events
pub type TransferUpdates =
    CompletionBounded<ObservableReader<TransferEvent>, fn(&TransferEvent) -> bool>;

// ============================================================================
// TransferStrategy
// ============================================================================

/// Network mechanics of one transfer direction
#[async_trait::async_trait]
pub trait TransferStrategy: Send + Sync {
    /// Direction of the transfer
    fn kind(&self) -> TransferKind;

    /// Remote object being transferred
    fn blob_path(&self) -> &BlobPath;

    /// Performs the transfer
    ///
    /// Every suspension point must go through [`TransferContext::guard`] so
    /// that cancellation tears the transport down.
    async fn execute(&self, ctx: &TransferContext) -> Result<(), SyncError>;
}

// ============================================================================
// TransferContext
// ============================================================================

/// Cancellation checkpoints and progress reporting handed to a strategy
pub struct TransferContext {
    token: CancellationToken,
    progress: Arc<ProgressThrottle>,
}

impl TransferContext {
    fn new(token: CancellationToken, events: Observable<TransferEvent>) -> Self {
        let progress = Arc::new(ProgressThrottle::new(events, token.clone()));
        Self { token, progress }
    }

    /// Fails with [`SyncError::TransferCancelled`] if cancellation was requested
    pub fn checkpoint(&self) -> Result<(), SyncError> {
        if self.token.is_cancelled() {
            Err(SyncError::TransferCancelled)
        } else {
            Ok(())
        }
    }

    /// Races `fut` against cancellation; a cancelled future is dropped
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, SyncError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SyncError::TransferCancelled),
            output = fut => Ok(output),
        }
    }

    /// Progress callback suitable for [`IBlobStore`] calls
    pub fn progress_fn(&self) -> ProgressFn {
        let throttle = Arc::clone(&self.progress);
        Box::new(move |done, total| throttle.report(done, total))
    }
}

/// Emits `Progress` only when the whole percentage changes
struct ProgressThrottle {
    events: Observable<TransferEvent>,
    token: CancellationToken,
    last_percent: AtomicI32,
}

impl ProgressThrottle {
    fn new(events: Observable<TransferEvent>, token: CancellationToken) -> Self {
        Self {
            events,
            token,
            last_percent: AtomicI32::new(-1),
        }
    }

    fn report(&self, done: u64, total: u64) {
        if total == 0 || self.token.is_cancelled() {
            return;
        }
        let fraction = (done as f64 / total as f64).clamp(0.0, 1.0);
        let percent = (fraction * 100.0).floor() as i32;
        if self.last_percent.swap(percent, Ordering::AcqRel) == percent {
            return;
        }
        self.events.set_if(
            |current| !current.is_terminal(),
            TransferEvent::Progress(fraction as f32),
        );
    }
}

// ============================================================================
// TransferSession
// ============================================================================

/// One upload or download of a single blob
pub struct TransferSession {
    id: Uuid,
    token: CancellationToken,
    events: Observable<TransferEvent>,
    started: AtomicBool,
    strategy: Box<dyn TransferStrategy>,
    created_at: DateTime<Utc>,
}

impl TransferSession {
    /// Creates a session in the `Initializing` state
    pub fn new(id: Uuid, strategy: impl TransferStrategy + 'static) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
            events: Observable::new(TransferEvent::Initializing),
            started: AtomicBool::new(false),
            strategy: Box::new(strategy),
            created_at: Utc::now(),
        }
    }

    /// Upload of `payload` to `path`
    pub fn upload(
        id: Uuid,
        store: Arc<dyn IBlobStore>,
        path: BlobPath,
        payload: UploadPayload,
    ) -> Self {
        Self::new(id, UploadSession::new(store, path, payload))
    }

    /// Download of `path` to `destination`
    pub fn download(
        id: Uuid,
        store: Arc<dyn IBlobStore>,
        path: BlobPath,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self::new(id, DownloadSession::new(store, path, destination))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TransferKind {
        self.strategy.kind()
    }

    pub fn blob_path(&self) -> &BlobPath {
        self.strategy.blob_path()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Latest lifecycle event
    pub fn state(&self) -> TransferEvent {
        self.events.get()
    }

    /// Returns true once a terminal event has been emitted
    pub fn is_finished(&self) -> bool {
        self.events.get().is_terminal()
    }

    /// Performs the transfer; only the first call does anything
    ///
    /// Never fails: the outcome is the terminal event.
    pub async fn run(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(id = %self.id, "Transfer already started, ignoring run()");
            return;
        }

        if self.token.is_cancelled() {
            self.finish(TransferEvent::Cancelled);
            return;
        }

        info!(
            id = %self.id,
            kind = %self.kind(),
            path = %self.blob_path(),
            "Transfer started"
        );
        self.emit(TransferEvent::Started);

        let ctx = TransferContext::new(self.token.clone(), self.events.clone());
        let terminal = match self.strategy.execute(&ctx).await {
            Ok(()) => TransferEvent::Completed,
            Err(e) if e.is_cancelled() || self.token.is_cancelled() => TransferEvent::Cancelled,
            Err(e) => {
                warn!(id = %self.id, path = %self.blob_path(), error = %e, "Transfer failed");
                TransferEvent::error(e)
            }
        };
        self.finish(terminal);
    }

    /// Requests cancellation; idempotent and safe at any time
    ///
    /// A session that has not started yet finishes as `Cancelled` at once,
    /// without any network I/O. A finished session is unaffected.
    pub fn cancel(&self) {
        self.token.cancel();
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.finish(TransferEvent::Cancelled);
        }
    }

    /// Returns true if cancellation has been requested
    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the session has reached a terminal event
    pub async fn finished(&self) -> TransferEvent {
        use futures_util::StreamExt;

        let mut updates = self.updates();
        let mut last = self.state();
        while let Some(event) = updates.next().await {
            last = event;
        }
        last
    }

    /// Direct subscription with a custom buffering policy
    pub fn subscribe(&self, policy: BufferingPolicy) -> TransferUpdates {
        self.events
            .subscribe(policy)
            .until(TransferEvent::is_terminal as fn(&TransferEvent) -> bool)
    }

    fn emit(&self, event: TransferEvent) {
        self.events.set_if(|current| !current.is_terminal(), event);
    }

    fn finish(&self, event: TransferEvent) {
        debug_assert!(event.is_terminal());
        if self.events.set_if(|current| !current.is_terminal(), event) {
            debug!(id = %self.id, state = %self.events.get(), "Transfer finished");
        }
        self.events.close();
    }
}

impl UpdateSource<TransferEvent> for TransferSession {
    type Updates = TransferUpdates;

    fn updates(&self) -> TransferUpdates {
        self.subscribe(BufferingPolicy::Unbounded)
    }
}

impl fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSession")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("blob_path", &self.blob_path().as_str())
            .field("state", &self.state())
            .finish()
    }
}
