//! PixSync Core - Domain types and port definitions
//!
//! This crate contains the pieces every other PixSync crate agrees on:
//! - **Domain types** - `ContentItem`, `BlobPath`, `TransferEvent`, `SyncStatus`,
//!   `MissingContentSet`, `RenderingJobRecord`, `ProjectEvent`
//! - **Error taxonomy** - `DomainError` and `SyncError`
//! - **Port definitions** - Traits for adapters: `IBlobStore`, `IRenderQueue`,
//!   `IContentCatalog`, `ILocalContentStore`
//! - **Configuration** - YAML-backed `Config` with validation
//!
//! # Architecture
//!
//! The transfer and reconciliation engine (`pixsync-sync`) depends only on
//! the ports defined here. The HTTP adapter (`pixsync-cloud`) and the
//! project-folder adapter implement them.

pub mod config;
pub mod domain;
pub mod ports;
