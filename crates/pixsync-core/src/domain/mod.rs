//! Domain types
//!
//! This module contains the core domain types for PixSync:
//! - Blob paths and their naming conventions
//! - Content items and categories
//! - Transfer lifecycle events
//! - Sync status classification and missing-content sets
//! - Rendering job records read from remote manifests
//! - Project notifications for the presentation layer
//! - Error types

pub mod content;
pub mod errors;
pub mod events;
pub mod newtypes;
pub mod rendering;
pub mod status;
pub mod transfer;

// Re-export commonly used types
pub use content::{ContentCategory, ContentItem, LocalFile};
pub use errors::{DomainError, SyncError};
pub use events::ProjectEvent;
pub use newtypes::BlobPath;
pub use rendering::{RenderingJobRecord, RenderingKind, RenderingSettings, RenderingStatus};
pub use status::{MissingContentSet, SyncStatus};
pub use transfer::{TransferEvent, TransferKind};
