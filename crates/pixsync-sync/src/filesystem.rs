//! Local project folder adapter (secondary/driven adapter)
//!
//! Implements [`ILocalContentStore`] and [`IContentCatalog`] on top of a
//! plain directory tree using `tokio::fs`:
//!
//! ```text
//! <root>/
//!   <project-id>/
//!     <project-id>.glb     model (zero bytes while only a placeholder)
//!     project.json         catalog entry: { "id", "name" }
//!     Images/              rendered images
//!     Videos/              rendered videos
//! ```
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: downloads and catalog entries are written to a
//!   `.tmp` sibling and renamed into place, so a listing never observes a
//!   half-written file under its final name.
//! - **Folder is the catalog**: a project exists locally exactly when its
//!   folder exists; there is no separate index to drift out of date.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use pixsync_core::domain::newtypes::lowercase;
use pixsync_core::domain::{ContentCategory, ContentItem, LocalFile};
use pixsync_core::ports::{IContentCatalog, ILocalContentStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Name of the per-project catalog entry
pub const PROJECT_FILE: &str = "project.json";

const TMP_SUFFIX: &str = ".tmp";

/// Writes `data` to `path` through a temporary sibling and a rename
///
/// Parent directories are created as needed.
pub async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = {
        let mut p = path.as_os_str().to_owned();
        p.push(TMP_SUFFIX);
        PathBuf::from(p)
    };

    debug!(?tmp_path, bytes = data.len(), "Writing temporary file");
    tokio::fs::write(&tmp_path, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectEntry {
    id: Uuid,
    name: String,
}

// ============================================================================
// ProjectFolderStore
// ============================================================================

/// Project folders under a single root directory
#[derive(Debug, Clone)]
pub struct ProjectFolderStore {
    root: PathBuf,
}

impl ProjectFolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding everything of one project
    pub fn project_dir(&self, project: Uuid) -> PathBuf {
        self.root.join(lowercase(project))
    }

    fn project_file(&self, project: Uuid) -> PathBuf {
        self.project_dir(project).join(PROJECT_FILE)
    }

    async fn read_entry(&self, project: Uuid) -> anyhow::Result<Option<ContentItem>> {
        if !tokio::fs::try_exists(self.project_dir(project)).await? {
            return Ok(None);
        }

        let name = match tokio::fs::read(self.project_file(project)).await {
            Ok(data) => match serde_json::from_slice::<ProjectEntry>(&data) {
                Ok(entry) => entry.name,
                Err(e) => {
                    warn!(%project, error = %e, "Unreadable project entry, using id as name");
                    lowercase(project)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => lowercase(project),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(ContentItem::model(
            project,
            name,
            self.model_path(project),
        )))
    }
}

fn is_hidden_or_partial(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(TMP_SUFFIX)
}

// ============================================================================
// ILocalContentStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalContentStore for ProjectFolderStore {
    fn model_path(&self, project: Uuid) -> PathBuf {
        let file = format!(
            "{}.{}",
            lowercase(project),
            ContentCategory::Model.extension()
        );
        self.project_dir(project).join(file)
    }

    fn content_dir(&self, project: Uuid, category: ContentCategory) -> PathBuf {
        self.project_dir(project).join(category.local_folder())
    }

    #[instrument(skip(self), fields(project = %project, category = %category))]
    async fn list_content(
        &self,
        project: Uuid,
        category: ContentCategory,
    ) -> anyhow::Result<Vec<LocalFile>> {
        let dir = self.content_dir(project, category);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden_or_partial(&name) {
                continue;
            }
            files.push(LocalFile {
                name,
                path: entry.path(),
                size: metadata.len(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(count = files.len(), "Listed local content");
        Ok(files)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn file_state(&self, path: &Path) -> anyhow::Result<Option<LocalFile>> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Ok(None);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Some(LocalFile {
            name,
            path: path.to_path_buf(),
            size: metadata.len(),
        }))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_file(&self, path: &Path) -> anyhow::Result<Bytes> {
        let data = tokio::fs::read(path).await?;
        debug!(bytes = data.len(), "File read complete");
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(project = %project))]
    async fn remove_project(&self, project: Uuid) -> anyhow::Result<()> {
        match tokio::fs::remove_dir_all(self.project_dir(project)).await {
            Ok(()) => {
                debug!("Project folder removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// IContentCatalog implementation
// ============================================================================

#[async_trait::async_trait]
impl IContentCatalog for ProjectFolderStore {
    #[instrument(skip(self))]
    async fn get_all(&self) -> anyhow::Result<Vec<ContentItem>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(project) = entry
                .file_name()
                .to_str()
                .and_then(|name| Uuid::parse_str(name).ok())
            else {
                continue;
            };
            if let Some(item) = self.read_entry(project).await? {
                items.push(item);
            }
        }
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        debug!(count = items.len(), "Catalog scanned");
        Ok(items)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<ContentItem>> {
        self.read_entry(id).await
    }

    /// Creates the project folder, its content directories and a zero-byte
    /// model placeholder if no model is present yet
    #[instrument(skip(self, item), fields(project = %item.id, name = %item.name))]
    async fn insert(&self, item: &ContentItem) -> anyhow::Result<()> {
        for category in ContentCategory::render_categories() {
            tokio::fs::create_dir_all(self.content_dir(item.id, category)).await?;
        }

        let model = self.model_path(item.id);
        if !tokio::fs::try_exists(&model).await? {
            tokio::fs::write(&model, b"").await?;
            debug!(path = %model.display(), "Model placeholder created");
        }

        let entry = ProjectEntry {
            id: item.id,
            name: item.name.clone(),
        };
        write_atomic(&self.project_file(item.id), &serde_json::to_vec_pretty(&entry)?).await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let existed = tokio::fs::try_exists(self.project_dir(id)).await?;
        self.remove_project(id).await?;
        Ok(existed)
    }
}
