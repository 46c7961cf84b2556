//! Project orchestration
//!
//! [`ProjectSyncService`] ties the engine together for the presentation
//! layer: it turns project-level intents (create, download, sync content,
//! delete, render) into transfer sessions and job pollers, and announces
//! their outcomes as [`ProjectEvent`]s.
//!
//! Every transfer operation returns as soon as its sessions are enqueued.
//! The returned session handles stay valid after the coordinator forgets
//! them, so a caller can always await the terminal event of its own
//! transfers; [`TransferCoordinator::observe`] follows the rest.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::{join_all, ready};
use futures_util::{Stream, StreamExt};
use pixsync_core::domain::newtypes::{lowercase, RENDERS_PREFIX};
use pixsync_core::domain::{
    BlobPath, ContentCategory, ContentItem, MissingContentSet, ProjectEvent, RenderingJobRecord,
    RenderingSettings, SyncError, SyncStatus, TransferEvent,
};
use pixsync_core::ports::{
    BlobStoreError, IBlobStore, IContentCatalog, ILocalContentStore, IRenderQueue,
};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::aggregator::FanInAggregator;
use crate::bounded::UpdateSource;
use crate::coordinator::TransferCoordinator;
use crate::filesystem::write_atomic;
use crate::observable::BufferingPolicy;
use crate::poller::{RemoteJobPoller, DEFAULT_POLL_INTERVAL};
use crate::reconcile::ReconciliationEngine;
use crate::session::{TransferSession, UploadPayload};

/// Capacity of the project event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Transfer identifier of a content file, stable across calls
pub fn content_transfer_id(path: &BlobPath) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, path.as_str().as_bytes())
}

/// Project-level operations over the transfer and reconciliation engine
pub struct ProjectSyncService {
    store: Arc<dyn IBlobStore>,
    render_queue: Arc<dyn IRenderQueue>,
    catalog: Arc<dyn IContentCatalog>,
    local: Arc<dyn ILocalContentStore>,
    coordinator: TransferCoordinator,
    reconciler: ReconciliationEngine,
    jobs: FanInAggregator<Option<RenderingJobRecord>>,
    pollers: Arc<DashMap<Uuid, Arc<RemoteJobPoller>>>,
    events: broadcast::Sender<ProjectEvent>,
    poll_interval: Duration,
    id_token: Option<String>,
}

impl ProjectSyncService {
    pub fn new(
        store: Arc<dyn IBlobStore>,
        render_queue: Arc<dyn IRenderQueue>,
        catalog: Arc<dyn IContentCatalog>,
        local: Arc<dyn ILocalContentStore>,
        coordinator: TransferCoordinator,
    ) -> Self {
        let reconciler = ReconciliationEngine::new(Arc::clone(&store), Arc::clone(&local));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            render_queue,
            catalog,
            local,
            coordinator,
            reconciler,
            jobs: FanInAggregator::new(None),
            pollers: Arc::new(DashMap::new()),
            events,
            poll_interval: DEFAULT_POLL_INTERVAL,
            id_token: None,
        }
    }

    /// Sets the delay between two reads of a rendering request manifest
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the credential written into rendering requests
    pub fn with_id_token(mut self, id_token: Option<String>) -> Self {
        self.id_token = id_token;
        self
    }

    pub fn coordinator(&self) -> &TransferCoordinator {
        &self.coordinator
    }

    pub fn reconciler(&self) -> &ReconciliationEngine {
        &self.reconciler
    }

    /// New receiver of project notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ProjectEvent) {
        debug!(?event, "Publishing project event");
        // No receivers is not an error.
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------------

    /// Uploads the model of `item` and records it in the catalog
    ///
    /// The catalog is only touched once the upload is accepted, so a
    /// rejected enqueue leaves it as it was.
    ///
    /// # Returns
    /// The upload session, whose identifier is the project identifier
    #[instrument(skip(self, item), fields(project = %item.id))]
    pub async fn create_project(
        &self,
        item: &ContentItem,
    ) -> Result<Arc<TransferSession>, SyncError> {
        let session = TransferSession::upload(
            item.id,
            Arc::clone(&self.store),
            BlobPath::model(item.id),
            UploadPayload::File(item.local_path.clone()),
        );
        let session = self.coordinator.enqueue(session)?;
        info!(name = %item.name, "Project upload enqueued");

        if let Err(e) = self.catalog.insert(item).await {
            session.cancel();
            return Err(SyncError::local(e));
        }

        self.publish(ProjectEvent::Added { project: item.id });
        Ok(session)
    }

    /// Copies a model file into a new project folder and uploads it
    ///
    /// # Returns
    /// The new project and its upload session
    #[instrument(skip(self, name), fields(source = %source.display()))]
    pub async fn import_model(
        &self,
        name: impl Into<String>,
        source: &Path,
    ) -> Result<(ContentItem, Arc<TransferSession>), SyncError> {
        let id = Uuid::new_v4();
        let destination = self.local.model_path(id);
        let data = self.local.read_file(source).await.map_err(SyncError::local)?;
        write_atomic(&destination, &data).await?;

        let item = ContentItem::model(id, name, destination);
        let session = self.create_project(&item).await?;
        Ok((item, session))
    }

    /// Downloads a project's model into its project folder
    ///
    /// Projects unknown to the catalog are recorded first.
    ///
    /// # Returns
    /// The download session, whose identifier is the project identifier
    #[instrument(skip(self), fields(project = %project))]
    pub async fn download_project(
        &self,
        project: Uuid,
    ) -> Result<Arc<TransferSession>, SyncError> {
        let known = self
            .catalog
            .get(project)
            .await
            .map_err(SyncError::local)?;
        if known.is_none() {
            let item = ContentItem::model(
                project,
                lowercase(project),
                self.local.model_path(project),
            );
            self.catalog.insert(&item).await.map_err(SyncError::local)?;
        }

        let session = TransferSession::download(
            project,
            Arc::clone(&self.store),
            BlobPath::model(project),
            self.local.model_path(project),
        );
        let session = self.coordinator.enqueue(session)?;
        info!("Project download enqueued");
        Ok(session)
    }

    /// Downloads every remote render missing locally
    ///
    /// Placeholders count as missing. Files already being downloaded are
    /// joined rather than enqueued twice. Once every returned transfer has
    /// finished, one [`ProjectEvent::ContentChanged`] per category lists the
    /// files that arrived.
    ///
    /// # Returns
    /// The download sessions, one per missing file
    #[instrument(skip(self), fields(project = %project))]
    pub async fn sync_project_content(
        &self,
        project: Uuid,
    ) -> Result<Vec<Arc<TransferSession>>, SyncError> {
        let missing = self
            .reconciler
            .compute_missing_content(project, true)
            .await?;

        let mut pending = Vec::new();
        for (category, names) in missing.iter() {
            let dir = self.local.content_dir(project, category);
            for name in names {
                let path = BlobPath::render(category, project, name)?;
                let id = content_transfer_id(&path);
                let session =
                    TransferSession::download(id, Arc::clone(&self.store), path, dir.join(name));
                let session = match self.coordinator.enqueue(session) {
                    Ok(session) => session,
                    Err(SyncError::AlreadyInFlight(_)) => match self.coordinator.session(id) {
                        Some(session) => session,
                        None => continue,
                    },
                    Err(e) => return Err(e),
                };
                pending.push((category, name.clone(), session));
            }
        }

        let sessions: Vec<Arc<TransferSession>> = pending
            .iter()
            .map(|(_, _, session)| Arc::clone(session))
            .collect();
        info!(count = sessions.len(), "Content downloads enqueued");
        if pending.is_empty() {
            return Ok(sessions);
        }

        let events = self.events.clone();
        tokio::spawn(async move {
            let outcomes = join_all(
                pending
                    .iter()
                    .map(|(_, _, session)| session.finished()),
            )
            .await;

            let mut changed: BTreeMap<ContentCategory, Vec<String>> = BTreeMap::new();
            for ((category, name, _), outcome) in pending.iter().zip(outcomes) {
                if outcome == TransferEvent::Completed {
                    changed.entry(*category).or_default().push(name.clone());
                } else {
                    debug!(%name, outcome = %outcome, "Content download did not complete");
                }
            }
            for (category, files) in changed {
                info!(%project, %category, count = files.len(), "Content changed");
                let _ = events.send(ProjectEvent::ContentChanged {
                    project,
                    category,
                    files,
                });
            }
        });

        Ok(sessions)
    }

    // ------------------------------------------------------------------------
    // Catalog maintenance
    // ------------------------------------------------------------------------

    /// Records every remote project missing from the catalog
    ///
    /// New projects get a placeholder model and are announced with
    /// [`ProjectEvent::Added`].
    ///
    /// # Returns
    /// The identifiers of the projects added
    #[instrument(skip(self))]
    pub async fn refresh_projects(&self) -> Result<Vec<Uuid>, SyncError> {
        let cloud = self.reconciler.fetch_cloud_projects().await?;
        let mut added = Vec::new();

        for project in cloud {
            if self
                .catalog
                .get(project)
                .await
                .map_err(SyncError::local)?
                .is_some()
            {
                continue;
            }
            let item = ContentItem::model(
                project,
                lowercase(project),
                self.local.model_path(project),
            );
            self.catalog.insert(&item).await.map_err(SyncError::local)?;
            self.publish(ProjectEvent::Added { project });
            added.push(project);
        }

        info!(added = added.len(), "Projects refreshed");
        Ok(added)
    }

    /// Removes a project remotely and locally
    ///
    /// In-flight transfers of the project are cancelled first. A remote
    /// model that is already gone is not an error.
    #[instrument(skip(self), fields(project = %project))]
    pub async fn delete_project(&self, project: Uuid) -> Result<(), SyncError> {
        for session in self.project_sessions(project) {
            session.cancel();
        }

        match self.store.delete_file(&BlobPath::model(project)).await {
            Ok(true) => debug!("Remote model deleted"),
            Ok(false) => warn!("Remote side did not confirm model deletion"),
            Err(BlobStoreError::NotFound(_)) => debug!("Remote model already gone"),
            Err(e) => return Err(e.into()),
        }

        self.local
            .remove_project(project)
            .await
            .map_err(SyncError::local)?;
        self.catalog
            .delete(project)
            .await
            .map_err(SyncError::local)?;

        info!("Project deleted");
        self.publish(ProjectEvent::Removed { project });
        Ok(())
    }

    /// Sync status of `item`, `Syncing` while any of its transfers runs
    pub async fn project_status(&self, item: &ContentItem) -> Result<SyncStatus, SyncError> {
        if !self.project_sessions(item.id).is_empty() {
            return Ok(SyncStatus::Syncing);
        }
        self.reconciler.compute_sync_status(item).await
    }

    /// Registered transfer sessions touching `project`
    ///
    /// That is the model blob and anything under the project's render
    /// folders. A render of another project is never matched, whatever its
    /// file name.
    fn project_sessions(&self, project: Uuid) -> Vec<Arc<TransferSession>> {
        let model = BlobPath::model(project);
        let key = lowercase(project);
        self.coordinator
            .active_ids()
            .into_iter()
            .filter_map(|id| self.coordinator.session(id))
            .filter(|session| {
                let path = session.blob_path();
                *path == model
                    || (path.starts_with(RENDERS_PREFIX)
                        && path
                            .parent()
                            .is_some_and(|parent| parent.file_name() == key))
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------------

    /// Requests a rendering of `model` and starts following it
    ///
    /// Writes the request manifest, notifies the renderer queue and tracks
    /// the request in [`watch_jobs`](Self::watch_jobs).
    ///
    /// # Returns
    /// The request identifier
    ///
    /// # Errors
    /// Returns [`SyncError::Unauthorized`] without touching the remote side
    /// if no credential is configured
    #[instrument(skip(self, settings), fields(model = %model, kind = %settings.kind))]
    pub async fn submit_rendering(
        &self,
        model: Uuid,
        settings: RenderingSettings,
    ) -> Result<Uuid, SyncError> {
        let id_token = self.id_token.clone().ok_or(SyncError::Unauthorized)?;
        let request = Uuid::new_v4();
        let record = RenderingJobRecord::queued(request, model, id_token, settings);

        self.store
            .put_bytes(
                &BlobPath::request_manifest(request),
                bytes::Bytes::from(record.to_json()?),
                None,
            )
            .await?;

        if !self.render_queue.submit(&record).await? {
            warn!(%request, "Renderer queue rejected the request");
            return Err(SyncError::TransferFailed(format!(
                "renderer queue rejected request {request}"
            )));
        }

        info!(%request, "Rendering requested");
        self.follow_job(RemoteJobPoller::with_initial(
            record,
            request,
            self.poll_interval,
            Arc::clone(&self.store),
        ));
        Ok(request)
    }

    /// Starts following a request submitted earlier
    ///
    /// # Returns
    /// `false` if the request is already being followed
    pub fn track_job(&self, request: Uuid) -> bool {
        if self.pollers.contains_key(&request) {
            return false;
        }
        self.follow_job(RemoteJobPoller::new(
            request,
            self.poll_interval,
            Arc::clone(&self.store),
        ))
    }

    fn follow_job(&self, poller: RemoteJobPoller) -> bool {
        let id = poller.id();
        let poller = Arc::new(poller);
        if self.pollers.insert(id, Arc::clone(&poller)).is_some() {
            debug!(%id, "Replacing job poller");
        }
        self.jobs.add(id, poller.updates().map(Some));

        let pollers = Arc::clone(&self.pollers);
        let task_poller = Arc::clone(&poller);
        let mut updates = poller.updates();
        tokio::spawn(async move {
            while updates.next().await.is_some() {}
            pollers.remove_if(&id, |_, current| Arc::ptr_eq(current, &task_poller));
            debug!(%id, "Job no longer followed");
        });

        poller.start()
    }

    /// Identifiers of the requests still being followed
    pub fn followed_jobs(&self) -> Vec<Uuid> {
        self.pollers.iter().map(|entry| *entry.key()).collect()
    }

    /// Stops following a request
    pub fn cancel_job(&self, request: Uuid) -> bool {
        match self.pollers.remove(&request) {
            Some((_, poller)) => {
                poller.cancel();
                self.jobs.remove(request);
                true
            }
            None => false,
        }
    }

    /// Combined record updates of every followed request
    pub fn watch_jobs(
        &self,
        policy: BufferingPolicy,
    ) -> impl Stream<Item = RenderingJobRecord> + Send + Unpin + 'static {
        self.jobs.updates(policy).filter_map(ready)
    }

    /// Renders still in production, grouped by project
    pub async fn processing_jobs(&self) -> Result<BTreeMap<Uuid, MissingContentSet>, SyncError> {
        self.reconciler.compute_processing_jobs().await
    }

    /// Cancels every transfer and stops following every job
    pub fn shutdown(&self) {
        info!("Shutting down project sync service");
        self.coordinator.cancel_all();
        for entry in self.pollers.iter() {
            entry.value().cancel();
        }
        self.pollers.clear();
        self.jobs.cancel_all();
    }
}
