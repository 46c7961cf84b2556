//! CLI subcommands and the wiring they share

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures_util::future::join_all;
use futures_util::StreamExt;
use pixsync_cloud::client::WebApiClient;
use pixsync_cloud::provider::WebApiBlobStore;
use pixsync_core::config::Config;
use pixsync_core::domain::{ContentItem, TransferEvent};
use pixsync_core::ports::IContentCatalog;
use pixsync_sync::{
    BufferingPolicy, ProjectFolderStore, ProjectSyncService, TransferCoordinator, TransferSession,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

pub mod config;
pub mod jobs;
pub mod missing;
pub mod projects;
pub mod status;
pub mod transfer;

// ============================================================================
// Command context
// ============================================================================

/// Global options and configuration shared by every command
pub struct CommandContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.is_json(), self.quiet)
    }
}

// ============================================================================
// Engine wiring
// ============================================================================

/// The project service together with the folder store it was built on
pub struct Engine {
    pub service: ProjectSyncService,
    pub folders: Arc<ProjectFolderStore>,
}

impl Engine {
    /// Wires the web API adapter, the project folders and the coordinator
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client
    /// cannot be built
    pub fn build(config: &Config) -> Result<Self> {
        if let Some(error) = config.validate().into_iter().next() {
            bail!("Invalid configuration: {error}. Run 'pixsync config validate' for details.");
        }

        let client = WebApiClient::from_config(&config.remote, config.auth.id_token.clone())
            .context("Failed to create web API client")?;
        let remote = Arc::new(WebApiBlobStore::new(client));
        let folders = Arc::new(ProjectFolderStore::new(config.sync.root.clone()));
        let coordinator = TransferCoordinator::new(config.sync.transfer_concurrency);

        info!(
            root = %config.sync.root.display(),
            api_url = %config.remote.api_url,
            concurrency = config.sync.transfer_concurrency,
            "Engine ready"
        );

        let service = ProjectSyncService::new(
            remote.clone(),
            remote,
            folders.clone(),
            folders.clone(),
            coordinator,
        )
        .with_poll_interval(config.job_poll_interval())
        .with_id_token(config.auth.id_token.clone());

        Ok(Self { service, folders })
    }

    /// Looks a project up in the local catalog
    ///
    /// # Errors
    /// Returns error if the project is not in the catalog
    pub async fn project(&self, project: Uuid) -> Result<ContentItem> {
        match self
            .folders
            .get(project)
            .await
            .context("Failed to read project catalog")?
        {
            Some(item) => Ok(item),
            None => bail!("Project {project} not found locally. Run 'pixsync refresh' first."),
        }
    }
}

// ============================================================================
// Waiting on transfers
// ============================================================================

/// Progress events kept per transfer while output is catching up
const PROGRESS_BACKLOG: usize = 8;

/// Final state of one transfer the CLI waited for
#[derive(Debug)]
pub struct TransferOutcome {
    pub id: Uuid,
    pub path: String,
    pub event: TransferEvent,
}

impl TransferOutcome {
    /// Only a transfer that completed counts as a success
    pub fn succeeded(&self) -> bool {
        self.event == TransferEvent::Completed
    }

    pub fn to_json(&self) -> serde_json::Value {
        let error = match &self.event {
            TransferEvent::Error(err) => Some(err.to_string()),
            _ => None,
        };
        serde_json::json!({
            "id": self.id.to_string(),
            "path": self.path,
            "state": self.event.name(),
            "error": error,
        })
    }
}

/// Waits for every session in `sessions` to reach its terminal event
///
/// Works on the session handles themselves, so a transfer that already
/// finished (and left the coordinator) still reports its real outcome.
/// Ctrl-C cancels the outstanding transfers; their outcomes are still
/// collected. Progress lines are printed for a lone transfer in human mode.
pub async fn wait_for_transfers(
    sessions: &[Arc<TransferSession>],
    formatter: &dyn OutputFormatter,
    show_progress: bool,
) -> Vec<TransferOutcome> {
    let progress = show_progress && sessions.len() == 1;
    let waits = sessions.iter().map(|session| async move {
        let mut updates = session.subscribe(BufferingPolicy::DropOldest(PROGRESS_BACKLOG));
        while let Some(event) = updates.next().await {
            if progress {
                if let TransferEvent::Progress(fraction) = event {
                    formatter.info(&format!("{:>3.0}%", fraction * 100.0));
                }
            }
        }
        let event = session.finished().await;
        debug!(id = %session.id(), %event, "Transfer finished");
        TransferOutcome {
            id: session.id(),
            path: session.blob_path().to_string(),
            event,
        }
    });

    let all = join_all(waits);
    tokio::pin!(all);
    tokio::select! {
        outcomes = &mut all => outcomes,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling transfers");
            formatter.warn("Interrupted, cancelling transfers");
            for session in sessions {
                session.cancel();
            }
            all.await
        }
    }
}

/// Prints transfer outcomes and fails if any transfer did not complete
pub fn report_outcomes(
    ctx: &CommandContext,
    formatter: &dyn OutputFormatter,
    label: &str,
    outcomes: &[TransferOutcome],
) -> Result<()> {
    let failed = outcomes.iter().filter(|o| !o.succeeded()).count();

    if ctx.is_json() {
        let json = serde_json::json!({
            "success": failed == 0,
            "operation": label,
            "transfers": outcomes.iter().map(TransferOutcome::to_json).collect::<Vec<_>>(),
        });
        formatter.print_json(&json);
    } else {
        for outcome in outcomes {
            let target = &outcome.path;
            match &outcome.event {
                TransferEvent::Error(err) => formatter.error(&format!("{target}: {err}")),
                TransferEvent::Cancelled => formatter.warn(&format!("{target}: cancelled")),
                _ => formatter.info(target),
            }
        }
        if failed == 0 {
            formatter.success(&format!("{label} complete ({} transfers)", outcomes.len()));
        }
    }

    if failed > 0 {
        bail!("{failed} of {} transfers did not complete", outcomes.len());
    }
    Ok(())
}
