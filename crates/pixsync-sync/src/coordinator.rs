//! Transfer coordinator
//!
//! Runs [`TransferSession`]s with bounded parallelism while ensuring:
//!
//! - **At most one session per identifier**: a second enqueue for an id that
//!   is still in flight is rejected with [`SyncError::AlreadyInFlight`]
//! - **Concurrency limiting**: a semaphore bounds how many sessions run
//! - **Self-cleanup**: each session's task removes its own table entry once
//!   the session reaches a terminal event
//! - **Observation**: any number of observers can watch a session through
//!   [`TransferCoordinator::observe`] without affecting it
//!
//! ```text
//! ┌────────────┐  enqueue()   ┌──────────────────────────┐
//! │   caller   │ ───────────► │   TransferCoordinator    │
//! └────────────┘              │  active: DashMap<id, S>  │
//!       │                     │  semaphore: permits      │
//!       │ observe(id)         └──────────────────────────┘
//!       │◄────────────────────────────│ spawn
//!       │                             ▼
//!       │                     ┌──────────────────────────┐
//!       │   events            │ acquire permit ─► run()  │
//!       │◄────────────────────│ remove own entry         │
//!                             └──────────────────────────┘
//! ```

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use pixsync_core::domain::SyncError;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bounded::UpdateSource;
use crate::session::{TransferSession, TransferUpdates};

/// Default number of sessions allowed to run at once
pub const DEFAULT_TRANSFER_CONCURRENCY: usize = 1;

/// Bounded-concurrency executor for transfer sessions
#[derive(Debug, Clone)]
pub struct TransferCoordinator {
    /// Sessions registered and not yet finished, keyed by content identifier
    active: Arc<DashMap<Uuid, Arc<TransferSession>>>,
    /// Semaphore for concurrency limiting
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl TransferCoordinator {
    /// Creates a coordinator running at most `max_concurrent` sessions at once
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            active: Arc::new(DashMap::new()),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Maximum number of sessions running at once
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Registers a session and schedules it
    ///
    /// Returns as soon as the session is registered; use
    /// [`observe`](Self::observe) to follow it.
    ///
    /// # Errors
    /// Returns [`SyncError::AlreadyInFlight`] if a session with the same
    /// identifier is still registered. The rejected session is left untouched.
    pub fn enqueue(&self, session: TransferSession) -> Result<Arc<TransferSession>, SyncError> {
        let id = session.id();
        let session = match self.active.entry(id) {
            Entry::Occupied(_) => {
                debug!(%id, "Transfer already in flight, rejecting enqueue");
                return Err(SyncError::AlreadyInFlight(id));
            }
            Entry::Vacant(vacant) => {
                let session = Arc::new(session);
                vacant.insert(Arc::clone(&session));
                session
            }
        };

        info!(
            %id,
            kind = %session.kind(),
            path = %session.blob_path(),
            "Transfer enqueued"
        );

        let semaphore = Arc::clone(&self.semaphore);
        let active = Arc::clone(&self.active);
        let task_session = Arc::clone(&session);
        tokio::spawn(async move {
            Self::run_session(&task_session, semaphore).await;
            active.remove_if(&id, |_, current| Arc::ptr_eq(current, &task_session));
            debug!(%id, state = %task_session.state(), "Transfer removed from table");
        });

        Ok(session)
    }

    async fn run_session(session: &TransferSession, semaphore: Arc<Semaphore>) {
        // Waiting for a permit must not hold back a cancellation.
        let permit = tokio::select! {
            permit = semaphore.acquire_owned() => permit,
            _ = session.finished() => return,
        };

        match permit {
            Ok(_permit) => session.run().await,
            Err(_) => {
                // The semaphore is never closed while the coordinator lives.
                session.cancel();
            }
        }
    }

    /// Fresh terminal-bounded view of a session's events
    ///
    /// Returns `None` if no session with this identifier is registered.
    pub fn observe(&self, id: Uuid) -> Option<TransferUpdates> {
        self.active.get(&id).map(|session| session.updates())
    }

    /// Returns the registered session, if any
    pub fn session(&self, id: Uuid) -> Option<Arc<TransferSession>> {
        self.active.get(&id).map(|session| Arc::clone(session.value()))
    }

    /// Cancels a session
    ///
    /// # Returns
    /// `true` if a session with this identifier was registered
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.active.get(&id) {
            Some(session) => {
                info!(%id, "Cancelling transfer");
                session.cancel();
                true
            }
            None => {
                debug!(%id, "No active transfer to cancel");
                false
            }
        }
    }

    /// Returns true if a session with this identifier is registered
    pub fn is_active(&self, id: Uuid) -> bool {
        self.active.contains_key(&id)
    }

    /// Number of registered sessions, running or waiting
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Identifiers of all registered sessions
    pub fn active_ids(&self) -> Vec<Uuid> {
        self.active.iter().map(|entry| *entry.key()).collect()
    }

    /// Cancels every registered session
    pub fn cancel_all(&self) {
        let sessions: Vec<_> = self
            .active
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        if !sessions.is_empty() {
            info!(count = sessions.len(), "Cancelling all transfers");
        }
        for session in sessions {
            session.cancel();
        }
    }
}

impl Default for TransferCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSFER_CONCURRENCY)
    }
}
