//! PixSync Sync - Content transfer and reconciliation engine
//!
//! Provides:
//! - Observable values bridged to pull-based streams
//! - Cancellable upload and download sessions with throttled progress
//! - Bounded-concurrency transfer scheduling
//! - Polling of remote rendering jobs
//! - Diffing of local and remote project content
//!
//! ## Modules
//!
//! - [`observable`] - Multi-subscriber observable with per-reader buffering
//! - [`bounded`] - Streams that end after their terminal item
//! - [`session`] - Transfer sessions and their upload/download strategies
//! - [`coordinator`] - Deduplicating, semaphore-bounded session executor
//! - [`poller`] - Rendering request manifest poller
//! - [`aggregator`] - Fan-in of many update streams into one
//! - [`reconcile`] - Missing content, sync status and pending renders
//! - [`filesystem`] - Project folder adapter (atomic writes, catalog)
//! - [`project`] - Project-level orchestration and notifications

pub mod aggregator;
pub mod bounded;
pub mod coordinator;
pub mod filesystem;
pub mod observable;
pub mod poller;
pub mod project;
pub mod reconcile;
pub mod session;

#[cfg(test)]
mod testing;

pub use aggregator::FanInAggregator;
pub use bounded::{CompletionBounded, CompletionBoundedExt, Terminal, UpdateSource};
pub use coordinator::TransferCoordinator;
pub use filesystem::ProjectFolderStore;
pub use observable::{BufferingPolicy, Observable, ObservableReader};
pub use poller::RemoteJobPoller;
pub use project::ProjectSyncService;
pub use reconcile::ReconciliationEngine;
pub use session::{TransferSession, TransferUpdates, UploadPayload};
