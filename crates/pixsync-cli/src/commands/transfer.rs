//! Transfer commands - Move models and renders between the project folders
//! and the cloud
//!
//! Provides `pixsync sync`, `pixsync download`, `pixsync import` and
//! `pixsync upload`. Each command enqueues its transfers and then waits for
//! all of them; Ctrl-C cancels whatever is still running.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;
use uuid::Uuid;

use super::{report_outcomes, wait_for_transfers, CommandContext, Engine};

// ============================================================================
// sync
// ============================================================================

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Project whose renders are downloaded
    pub project: Uuid,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let engine = Engine::build(&ctx.config)?;

        let sessions = engine
            .service
            .sync_project_content(self.project)
            .await
            .context("Failed to start content sync")?;

        if sessions.is_empty() {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": true,
                    "operation": "sync",
                    "transfers": [],
                }));
            } else {
                formatter.success("Project content is up to date");
            }
            return Ok(());
        }

        info!(project = %self.project, count = sessions.len(), "Waiting for content downloads");
        let outcomes = wait_for_transfers(&sessions, formatter.as_ref(), !ctx.quiet).await;
        report_outcomes(ctx, formatter.as_ref(), "Sync", &outcomes)
    }
}

// ============================================================================
// download
// ============================================================================

#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Project whose model is downloaded
    pub project: Uuid,

    /// Also download every render missing locally
    #[arg(long)]
    pub with_content: bool,
}

impl DownloadCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let engine = Engine::build(&ctx.config)?;

        let session = engine
            .service
            .download_project(self.project)
            .await
            .context("Failed to start model download")?;
        let mut outcomes = wait_for_transfers(&[session], formatter.as_ref(), !ctx.quiet).await;

        if self.with_content && outcomes.iter().all(|o| o.succeeded()) {
            let sessions = engine
                .service
                .sync_project_content(self.project)
                .await
                .context("Failed to start content sync")?;
            outcomes.extend(wait_for_transfers(&sessions, formatter.as_ref(), false).await);
        }

        report_outcomes(ctx, formatter.as_ref(), "Download", &outcomes)
    }
}

// ============================================================================
// import
// ============================================================================

#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Model file (.glb) to import
    pub file: PathBuf,

    /// Display name of the new project; defaults to the file stem
    #[arg(long)]
    pub name: Option<String>,
}

impl ImportCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();

        if !self.file.is_file() {
            bail!("Model file not found: {}", self.file.display());
        }
        let name = project_name(&self.file, self.name.as_deref())?;

        let engine = Engine::build(&ctx.config)?;
        let (item, session) = engine
            .service
            .import_model(name, &self.file)
            .await
            .with_context(|| format!("Failed to import {}", self.file.display()))?;

        if !ctx.is_json() {
            formatter.info(&format!("Project {} created as {}", item.name, item.id));
        }
        let outcomes = wait_for_transfers(&[session], formatter.as_ref(), !ctx.quiet).await;
        report_outcomes(ctx, formatter.as_ref(), "Import", &outcomes)
    }
}

/// Project name from `--name`, else from the model file stem
fn project_name(file: &std::path::Path, name: Option<&str>) -> Result<String> {
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }
    match file.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) if !stem.is_empty() => Ok(stem.to_string()),
        _ => bail!("Cannot derive a project name from {}; pass --name", file.display()),
    }
}

// ============================================================================
// upload
// ============================================================================

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Project whose model is uploaded
    pub project: Uuid,
}

impl UploadCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let engine = Engine::build(&ctx.config)?;

        let item = engine.project(self.project).await?;
        let session = engine
            .service
            .create_project(&item)
            .await
            .context("Failed to start model upload")?;

        let outcomes = wait_for_transfers(&[session], formatter.as_ref(), !ctx.quiet).await;
        report_outcomes(ctx, formatter.as_ref(), "Upload", &outcomes)
    }
}
