//! Catalog commands - `pixsync refresh` and `pixsync delete`

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;
use uuid::Uuid;

use super::{CommandContext, Engine};

#[derive(Debug, Args)]
pub struct RefreshCommand {}

impl RefreshCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let engine = Engine::build(&ctx.config)?;

        let added = engine
            .service
            .refresh_projects()
            .await
            .context("Failed to list cloud projects")?;

        info!(added = added.len(), "Refresh finished");
        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "added": added.iter().map(Uuid::to_string).collect::<Vec<_>>(),
            }));
        } else if added.is_empty() {
            formatter.success("Catalog already lists every cloud project");
        } else {
            formatter.success(&format!("{} project(s) added", added.len()));
            for project in &added {
                formatter.info(&project.to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Project to delete
    pub project: Uuid,

    /// Confirm deletion of the remote model and the local project folder
    #[arg(long)]
    pub yes: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        if !self.yes {
            bail!(
                "Deleting {} removes it locally and in the cloud; pass --yes to confirm",
                self.project
            );
        }

        let engine = Engine::build(&ctx.config)?;
        engine
            .service
            .delete_project(self.project)
            .await
            .with_context(|| format!("Failed to delete project {}", self.project))?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "deleted": self.project.to_string(),
            }));
        } else {
            formatter.success(&format!("Project {} deleted", self.project));
        }
        Ok(())
    }
}
