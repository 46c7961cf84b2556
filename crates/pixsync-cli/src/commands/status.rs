//! Status command - Display project sync status
//!
//! Provides the `pixsync status` CLI command which:
//! 1. Lists every project in the local catalog with its sync status
//! 2. Shows a single project when an identifier is given
//! 3. Optionally records cloud-only projects first (`--refresh`)

use anyhow::{Context, Result};
use clap::Args;
use pixsync_core::domain::{ContentItem, SyncError, SyncStatus};
use pixsync_core::ports::IContentCatalog;
use tracing::info;
use uuid::Uuid;

use super::{CommandContext, Engine};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Project to show; all projects when omitted
    pub project: Option<Uuid>,

    /// Record cloud projects missing from the catalog before reporting
    #[arg(long)]
    pub refresh: bool,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let engine = Engine::build(&ctx.config)?;

        if self.refresh {
            let added = engine
                .service
                .refresh_projects()
                .await
                .context("Failed to refresh projects from the cloud")?;
            info!(added = added.len(), "Catalog refreshed");
        }

        let items = match self.project {
            Some(project) => vec![engine.project(project).await?],
            None => engine
                .folders
                .get_all()
                .await
                .context("Failed to read project catalog")?,
        };

        let mut rows = Vec::with_capacity(items.len());
        for item in &items {
            let status = engine.service.project_status(item).await;
            rows.push(status_row(item, status));
        }

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({ "projects": rows }));
            return Ok(());
        }

        if rows.is_empty() {
            formatter.info("No projects. Run 'pixsync refresh' or 'pixsync import <file>'.");
            return Ok(());
        }

        formatter.success(&format!("{} project(s)", rows.len()));
        for (item, row) in items.iter().zip(&rows) {
            let state = row["status"]
                .as_str()
                .or_else(|| row["error"].as_str())
                .unwrap_or("unknown");
            formatter.info(&format!("{:<24} {}  {}", item.name, item.id, state));
        }
        Ok(())
    }
}

/// JSON row for one project; status failures are reported per row
fn status_row(item: &ContentItem, status: Result<SyncStatus, SyncError>) -> serde_json::Value {
    match status {
        Ok(status) => serde_json::json!({
            "id": item.id.to_string(),
            "name": item.name,
            "status": status.to_string(),
        }),
        Err(e) => serde_json::json!({
            "id": item.id.to_string(),
            "name": item.name,
            "error": e.to_string(),
        }),
    }
}
