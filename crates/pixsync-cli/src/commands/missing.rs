//! Missing command - List remote renders that are not available locally

use anyhow::{Context, Result};
use clap::Args;
use pixsync_core::domain::MissingContentSet;
use tracing::info;
use uuid::Uuid;

use super::{CommandContext, Engine};

#[derive(Debug, Args)]
pub struct MissingCommand {
    /// Project to inspect
    pub project: Uuid,

    /// Count zero-byte placeholder files as missing
    #[arg(long)]
    pub include_placeholders: bool,
}

impl MissingCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let engine = Engine::build(&ctx.config)?;

        let missing = engine
            .service
            .reconciler()
            .compute_missing_content(self.project, self.include_placeholders)
            .await
            .context("Failed to compare local and remote content")?;

        info!(project = %self.project, total = missing.total(), "Missing content computed");

        if ctx.is_json() {
            let json = serde_json::json!({
                "project": self.project.to_string(),
                "total": missing.total(),
                "missing": missing,
            });
            formatter.print_json(&json);
        } else if missing.is_empty() {
            formatter.success("All remote content is available locally");
        } else {
            formatter.success(&format!("{} file(s) missing locally", missing.total()));
            for line in missing_lines(&missing) {
                formatter.info(&line);
            }
        }
        Ok(())
    }
}

fn missing_lines(missing: &MissingContentSet) -> Vec<String> {
    let mut lines = Vec::new();
    for (category, names) in missing.iter() {
        if names.is_empty() {
            continue;
        }
        lines.push(format!("{category}:"));
        lines.extend(names.iter().map(|name| format!("  {name}")));
    }
    lines
}
