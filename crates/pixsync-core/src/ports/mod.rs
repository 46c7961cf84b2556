//! Port definitions (hexagonal architecture interfaces)
//!
//! The transfer and reconciliation engine depends only on these traits;
//! adapter crates provide the implementations.
//!
//! ## Ports Overview
//!
//! - [`IBlobStore`] - Remote blob storage (list/get/put/delete by path)
//! - [`IRenderQueue`] - Notification of the remote renderer queue
//! - [`IContentCatalog`] - Local catalog of projects, by identifier
//! - [`ILocalContentStore`] - Local project folders and their content files

pub mod blob_store;
pub mod catalog;
pub mod local_store;

pub use blob_store::{BlobStoreError, IBlobStore, IRenderQueue, ProgressFn};
pub use catalog::IContentCatalog;
pub use local_store::ILocalContentStore;
