//! Reconciliation of local and remote content
//!
//! The [`ReconciliationEngine`] answers three questions purely by diffing
//! listings, without any state of its own:
//!
//! - **What is missing locally?** Remote render file names minus local ones,
//!   per category ([`compute_missing_content`])
//! - **Where does a project stand?** The [`SyncStatus`] truth table over
//!   local presence, remote presence and content parity
//!   ([`compute_sync_status`])
//! - **Which renders are still being produced?** Request manifests that have
//!   no output blob yet and are not finished ([`compute_processing_jobs`])
//!
//! Listing failures are returned as errors; a partial listing is never used
//! to draw conclusions.
//!
//! [`compute_missing_content`]: ReconciliationEngine::compute_missing_content
//! [`compute_sync_status`]: ReconciliationEngine::compute_sync_status
//! [`compute_processing_jobs`]: ReconciliationEngine::compute_processing_jobs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use pixsync_core::domain::newtypes::{lowercase, MODELS_PREFIX, REQUESTS_PREFIX};
use pixsync_core::domain::{
    BlobPath, ContentCategory, ContentItem, MissingContentSet, RenderingJobRecord, SyncError,
    SyncStatus,
};
use pixsync_core::ports::{BlobStoreError, IBlobStore, ILocalContentStore};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Stateless diffing of local and remote content
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn IBlobStore>,
    local: Arc<dyn ILocalContentStore>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn IBlobStore>, local: Arc<dyn ILocalContentStore>) -> Self {
        Self { store, local }
    }

    /// Remote render files of `project` that are absent locally
    ///
    /// # Arguments
    /// * `project` - Project identifier
    /// * `include_placeholders` - Count zero-byte local files as absent
    ///
    /// # Returns
    /// A set with an entry for every render category, possibly empty
    ///
    /// # Errors
    /// Fails if any remote or local listing fails
    #[instrument(skip(self), fields(project = %project))]
    pub async fn compute_missing_content(
        &self,
        project: Uuid,
        include_placeholders: bool,
    ) -> Result<MissingContentSet, SyncError> {
        let mut missing = MissingContentSet::new();

        for category in ContentCategory::render_categories() {
            let remote = self.remote_names(category, project).await?;
            let local = self
                .local_names(project, category, include_placeholders)
                .await?;
            let absent: BTreeSet<String> = remote.difference(&local).cloned().collect();
            debug!(
                %category,
                remote = remote.len(),
                local = local.len(),
                missing = absent.len(),
                "Content diffed"
            );
            missing.set(category, absent);
        }

        Ok(missing)
    }

    /// Classifies a project from current local and remote facts
    ///
    /// # Errors
    /// Returns [`SyncError::Inconsistent`] if the project exists neither
    /// locally nor remotely, or any listing error
    #[instrument(skip(self, item), fields(project = %item.id))]
    pub async fn compute_sync_status(&self, item: &ContentItem) -> Result<SyncStatus, SyncError> {
        let local = self
            .local
            .file_state(&item.local_path)
            .await
            .map_err(SyncError::local)?
            .is_some_and(|file| !file.is_placeholder());

        let model = BlobPath::model(item.id);
        let cloud = self
            .store
            .list_files(model.as_str())
            .await?
            .iter()
            .any(|path| *path == model);

        let content_synced = if local && cloud {
            self.compute_missing_content(item.id, false).await?.is_empty()
        } else {
            false
        };

        let status = SyncStatus::from_facts(local, cloud, content_synced)?;
        debug!(local, cloud, content_synced, %status, "Sync status computed");
        Ok(status)
    }

    /// Renders still being produced, grouped by project
    ///
    /// A request is pending when its manifest exists, no output blob named
    /// after the request id exists under any render category, and the
    /// manifest's status is not terminal. Pending file names are
    /// `<requestId>.<ext>`.
    ///
    /// # Errors
    /// Fails if any listing fails or a manifest cannot be fetched for a
    /// reason other than having disappeared
    #[instrument(skip(self))]
    pub async fn compute_processing_jobs(
        &self,
    ) -> Result<BTreeMap<Uuid, MissingContentSet>, SyncError> {
        let manifests = self.store.list_files(REQUESTS_PREFIX).await?;

        let mut produced = BTreeSet::new();
        for category in ContentCategory::render_categories() {
            let outputs = self
                .store
                .list_files(&BlobPath::render_category_prefix(category))
                .await?;
            produced.extend(outputs.iter().map(|path| path.file_stem().to_string()));
        }

        let mut jobs: BTreeMap<Uuid, MissingContentSet> = BTreeMap::new();
        for manifest in manifests {
            let Some(request_id) = manifest.stem_uuid() else {
                debug!(path = %manifest, "Skipping non-request blob");
                continue;
            };
            let request_key = lowercase(request_id);
            if produced.contains(&request_key) {
                continue;
            }

            let bytes = match self.store.get_bytes(&manifest, None).await {
                Ok(bytes) => bytes,
                Err(BlobStoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            let record = match RenderingJobRecord::from_json(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %manifest, error = %e, "Skipping unreadable request manifest");
                    continue;
                }
            };
            if record.is_terminal() {
                continue;
            }
            let Some(model) = record.model_id() else {
                warn!(path = %manifest, id_model = %record.id_model, "Request has no valid model id");
                continue;
            };

            let category = record.settings.kind.category();
            jobs.entry(model)
                .or_default()
                .insert(category, format!("{request_key}.{}", category.extension()));
        }

        debug!(projects = jobs.len(), "Processing jobs computed");
        Ok(jobs)
    }

    /// Identifiers of all projects whose model exists remotely
    ///
    /// # Errors
    /// Fails if the model listing fails
    #[instrument(skip(self))]
    pub async fn fetch_cloud_projects(&self) -> Result<BTreeSet<Uuid>, SyncError> {
        let extension = format!(".{}", ContentCategory::Model.extension());
        let projects = self
            .store
            .list_files(MODELS_PREFIX)
            .await?
            .iter()
            .filter(|path| path.file_name().ends_with(&extension))
            .filter_map(BlobPath::stem_uuid)
            .collect();
        Ok(projects)
    }

    async fn remote_names(
        &self,
        category: ContentCategory,
        project: Uuid,
    ) -> Result<BTreeSet<String>, SyncError> {
        let prefix = BlobPath::render_prefix(category, project);
        let names = self
            .store
            .list_files(&prefix)
            .await?
            .iter()
            .map(|path| path.file_name().to_string())
            .collect();
        Ok(names)
    }

    async fn local_names(
        &self,
        project: Uuid,
        category: ContentCategory,
        include_placeholders: bool,
    ) -> Result<BTreeSet<String>, SyncError> {
        let files = self
            .local
            .list_content(project, category)
            .await
            .map_err(SyncError::local)?;
        Ok(files
            .into_iter()
            .filter(|file| !(include_placeholders && file.is_placeholder()))
            .map(|file| file.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use pixsync_core::domain::{RenderingSettings, RenderingStatus};
    use pixsync_core::domain::rendering::RenderingKind;
    use tempfile::TempDir;

    use super::*;
    use crate::filesystem::ProjectFolderStore;
    use crate::testing::MemoryBlobStore;

    struct Fixture {
        _dir: TempDir,
        store: Arc<MemoryBlobStore>,
        local: Arc<ProjectFolderStore>,
        engine: ReconciliationEngine,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        let local = Arc::new(ProjectFolderStore::new(dir.path()));
        let engine = ReconciliationEngine::new(store.clone(), local.clone());
        Fixture {
            _dir: dir,
            store,
            local,
            engine,
        }
    }

    fn put_render(store: &MemoryBlobStore, category: ContentCategory, project: Uuid, name: &str) {
        let path = BlobPath::render(category, project, name).unwrap();
        store.insert(&path, Bytes::from_static(b"render"));
    }

    fn write_local(f: &Fixture, project: Uuid, category: ContentCategory, name: &str, data: &[u8]) {
        let dir = f.local.content_dir(project, category);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), data).unwrap();
    }

    fn write_model(f: &Fixture, project: Uuid, data: &[u8]) -> ContentItem {
        let path = f.local.model_path(project);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, data).unwrap();
        ContentItem::model(project, "Project", path)
    }

    #[tokio::test]
    async fn test_missing_content_diff() {
        let f = fixture();
        let project = Uuid::new_v4();
        put_render(&f.store, ContentCategory::Image, project, "a.png");
        put_render(&f.store, ContentCategory::Image, project, "b.png");
        put_render(&f.store, ContentCategory::Video, project, "c.mp4");
        write_local(&f, project, ContentCategory::Image, "b.png", b"data");

        let missing = f.engine.compute_missing_content(project, false).await.unwrap();
        let images: Vec<_> = missing.get(ContentCategory::Image).unwrap().iter().cloned().collect();
        let videos: Vec<_> = missing.get(ContentCategory::Video).unwrap().iter().cloned().collect();
        assert_eq!(images, vec!["a.png"]);
        assert_eq!(videos, vec!["c.mp4"]);
    }

    #[tokio::test]
    async fn test_missing_content_is_repeatable() {
        let f = fixture();
        let project = Uuid::new_v4();
        put_render(&f.store, ContentCategory::Video, project, "c.mp4");

        let first = f.engine.compute_missing_content(project, true).await.unwrap();
        let second = f.engine.compute_missing_content(project, true).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_placeholders_count_as_missing_only_when_asked() {
        let f = fixture();
        let project = Uuid::new_v4();
        put_render(&f.store, ContentCategory::Image, project, "a.png");
        write_local(&f, project, ContentCategory::Image, "a.png", b"");

        let without = f.engine.compute_missing_content(project, false).await.unwrap();
        assert!(without.is_empty());
        let with = f.engine.compute_missing_content(project, true).await.unwrap();
        assert!(with.get(ContentCategory::Image).unwrap().contains("a.png"));
    }

    #[tokio::test]
    async fn test_missing_content_ignores_other_projects() {
        let f = fixture();
        let project = Uuid::new_v4();
        put_render(&f.store, ContentCategory::Image, Uuid::new_v4(), "other.png");

        let missing = f.engine.compute_missing_content(project, true).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let f = fixture();
        f.store.fail_listings(true);
        let err = f
            .engine
            .compute_missing_content(Uuid::new_v4(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(BlobStoreError::Transport(_))));
    }

    #[tokio::test]
    async fn test_status_cloud_only() {
        let f = fixture();
        let project = Uuid::new_v4();
        f.store.insert(&BlobPath::model(project), Bytes::from_static(b"glb"));
        let item = ContentItem::model(project, "P", f.local.model_path(project));

        let status = f.engine.compute_sync_status(&item).await.unwrap();
        assert_eq!(status, SyncStatus::Cloud);
    }

    #[tokio::test]
    async fn test_status_placeholder_model_counts_as_cloud() {
        let f = fixture();
        let project = Uuid::new_v4();
        f.store.insert(&BlobPath::model(project), Bytes::from_static(b"glb"));
        let item = write_model(&f, project, b"");

        let status = f.engine.compute_sync_status(&item).await.unwrap();
        assert_eq!(status, SyncStatus::Cloud);
    }

    #[tokio::test]
    async fn test_status_local_only() {
        let f = fixture();
        let item = write_model(&f, Uuid::new_v4(), b"glb");
        let status = f.engine.compute_sync_status(&item).await.unwrap();
        assert_eq!(status, SyncStatus::Local);
    }

    #[tokio::test]
    async fn test_status_cloud_content_pending() {
        let f = fixture();
        let project = Uuid::new_v4();
        f.store.insert(&BlobPath::model(project), Bytes::from_static(b"glb"));
        put_render(&f.store, ContentCategory::Image, project, "a.png");
        let item = write_model(&f, project, b"glb");

        let status = f.engine.compute_sync_status(&item).await.unwrap();
        assert_eq!(status, SyncStatus::CloudContentPending);

        let missing = f.engine.compute_missing_content(project, false).await.unwrap();
        assert_eq!(
            serde_json::to_value(&missing).unwrap(),
            serde_json::json!({"images": ["a.png"], "videos": []})
        );
    }

    #[tokio::test]
    async fn test_status_synced() {
        let f = fixture();
        let project = Uuid::new_v4();
        f.store.insert(&BlobPath::model(project), Bytes::from_static(b"glb"));
        put_render(&f.store, ContentCategory::Video, project, "v.mp4");
        write_local(&f, project, ContentCategory::Video, "v.mp4", b"video");
        let item = write_model(&f, project, b"glb");

        let status = f.engine.compute_sync_status(&item).await.unwrap();
        assert_eq!(status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_status_neither_is_inconsistent() {
        let f = fixture();
        let project = Uuid::new_v4();
        let item = ContentItem::model(project, "P", f.local.model_path(project));

        let err = f.engine.compute_sync_status(&item).await.unwrap_err();
        assert!(matches!(err, SyncError::Inconsistent(_)));
    }

    fn put_manifest(
        store: &MemoryBlobStore,
        request: Uuid,
        model: Uuid,
        kind: RenderingKind,
        status: RenderingStatus,
    ) {
        let settings = RenderingSettings {
            kind,
            ..RenderingSettings::default()
        };
        let mut record = RenderingJobRecord::queued(request, model, "token", settings);
        record.status = status;
        store.insert(
            &BlobPath::request_manifest(request),
            Bytes::from(record.to_json().unwrap()),
        );
    }

    #[tokio::test]
    async fn test_processing_jobs() {
        let f = fixture();
        let model = Uuid::new_v4();
        let pending_image = Uuid::new_v4();
        let pending_video = Uuid::new_v4();
        let produced = Uuid::new_v4();
        let finished = Uuid::new_v4();

        put_manifest(&f.store, pending_image, model, RenderingKind::Image, RenderingStatus::Rendering);
        put_manifest(&f.store, pending_video, model, RenderingKind::Video, RenderingStatus::Queue);
        put_manifest(&f.store, produced, model, RenderingKind::Image, RenderingStatus::Composing);
        put_manifest(&f.store, finished, model, RenderingKind::Image, RenderingStatus::Error);
        put_render(
            &f.store,
            ContentCategory::Image,
            model,
            &format!("{}.png", lowercase(produced)),
        );

        let jobs = f.engine.compute_processing_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        let pending = &jobs[&model];
        assert_eq!(pending.total(), 2);
        assert!(pending
            .get(ContentCategory::Image)
            .unwrap()
            .contains(&format!("{}.png", lowercase(pending_image))));
        assert!(pending
            .get(ContentCategory::Video)
            .unwrap()
            .contains(&format!("{}.mp4", lowercase(pending_video))));
    }

    #[tokio::test]
    async fn test_processing_jobs_skips_unreadable_manifest() {
        let f = fixture();
        let request = Uuid::new_v4();
        f.store.insert(&BlobPath::request_manifest(request), Bytes::from_static(b"garbage"));

        let jobs = f.engine.compute_processing_jobs().await.unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_cloud_projects() {
        let f = fixture();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        f.store.insert(&BlobPath::model(a), Bytes::from_static(b"a"));
        f.store.insert(&BlobPath::model(b), Bytes::from_static(b"b"));
        f.store.insert(&BlobPath::new("models/readme.txt").unwrap(), Bytes::from_static(b"x"));

        let projects = f.engine.fetch_cloud_projects().await.unwrap();
        assert_eq!(projects, BTreeSet::from([a, b]));
    }
}
