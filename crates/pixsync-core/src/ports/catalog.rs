//! Content catalog port (driven/secondary port)
//!
//! The catalog owns [`ContentItem`]s; the engine only reads and writes them
//! by identifier.

use uuid::Uuid;

use crate::domain::content::ContentItem;

/// Port trait for the local catalog of projects
///
/// Uses `anyhow::Result` because catalog failures are adapter-specific and
/// are reported to callers as `SyncError::Local`.
#[async_trait::async_trait]
pub trait IContentCatalog: Send + Sync {
    /// Returns every item in the catalog
    async fn get_all(&self) -> anyhow::Result<Vec<ContentItem>>;

    /// Looks up an item by identifier
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<ContentItem>>;

    /// Inserts or replaces an item
    async fn insert(&self, item: &ContentItem) -> anyhow::Result<()>;

    /// Removes an item
    ///
    /// # Returns
    /// `true` if the item existed
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}
