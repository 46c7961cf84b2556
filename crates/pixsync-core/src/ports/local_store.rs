//! Local content store port (driven/secondary port)
//!
//! Abstracts the on-disk layout of project folders: where a project's model
//! lives, where its rendered images and videos go, and what is there now.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use uuid::Uuid;

use crate::domain::content::{ContentCategory, LocalFile};

/// Port trait for local project storage
#[async_trait::async_trait]
pub trait ILocalContentStore: Send + Sync {
    /// Path of a project's model file
    fn model_path(&self, project: Uuid) -> PathBuf;

    /// Directory holding one render category of a project
    fn content_dir(&self, project: Uuid, category: ContentCategory) -> PathBuf;

    /// Lists the files currently present in a content directory
    ///
    /// A missing directory yields an empty list.
    async fn list_content(
        &self,
        project: Uuid,
        category: ContentCategory,
    ) -> anyhow::Result<Vec<LocalFile>>;

    /// Describes the file at `path`, or `None` if it does not exist
    async fn file_state(&self, path: &Path) -> anyhow::Result<Option<LocalFile>>;

    /// Reads a whole file
    async fn read_file(&self, path: &Path) -> anyhow::Result<Bytes>;

    /// Removes a project folder and everything in it
    async fn remove_project(&self, project: Uuid) -> anyhow::Result<()>;
}
