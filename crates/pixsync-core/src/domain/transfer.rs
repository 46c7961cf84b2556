//! Transfer lifecycle events
//!
//! Every transfer session emits a strictly ordered sequence of
//! [`TransferEvent`]s:
//!
//! ```text
//! Initializing ─► Started ─► Progress* ─┬─► Completed
//!       │                                ├─► Cancelled
//!       └──── cancel before start ───────┴─► Error
//! ```
//!
//! Exactly one terminal event is emitted per session and it is always last.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::SyncError;

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Local content to the blob store
    Upload,
    /// Blob store content to local storage
    Download,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Upload => write!(f, "upload"),
            TransferKind::Download => write!(f, "download"),
        }
    }
}

/// Lifecycle event of a single transfer
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// Session created, not yet running
    Initializing,
    /// Network activity has begun
    Started,
    /// Fraction completed, 0.0 to 1.0
    Progress(f32),
    /// Cancelled cooperatively
    Cancelled,
    /// Failed for a reason other than cancellation
    Error(Arc<SyncError>),
    /// Finished successfully
    Completed,
}

impl TransferEvent {
    /// Returns true for `Completed`, `Cancelled` and `Error`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferEvent::Completed | TransferEvent::Cancelled | TransferEvent::Error(_)
        )
    }

    /// Best-effort completion fraction for display
    pub fn progress(&self) -> Option<f32> {
        match self {
            TransferEvent::Started => Some(0.0),
            TransferEvent::Progress(fraction) => Some(*fraction),
            TransferEvent::Completed => Some(1.0),
            _ => None,
        }
    }

    /// Short state name
    pub fn name(&self) -> &'static str {
        match self {
            TransferEvent::Initializing => "initializing",
            TransferEvent::Started => "started",
            TransferEvent::Progress(_) => "progress",
            TransferEvent::Cancelled => "cancelled",
            TransferEvent::Error(_) => "error",
            TransferEvent::Completed => "completed",
        }
    }

    /// Wraps an error into a terminal event
    pub fn error(err: SyncError) -> Self {
        TransferEvent::Error(Arc::new(err))
    }
}

impl PartialEq for TransferEvent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TransferEvent::Progress(a), TransferEvent::Progress(b)) => a == b,
            (TransferEvent::Error(a), TransferEvent::Error(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferEvent::Progress(fraction) => write!(f, "progress {:.0}%", fraction * 100.0),
            TransferEvent::Error(err) => write!(f, "error: {err}"),
            other => write!(f, "{}", other.name()),
        }
    }
}
