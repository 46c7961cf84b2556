//! Rendering commands
//!
//! `pixsync render` writes a rendering request and notifies the renderer
//! queue. `pixsync jobs` lists renders still in production and, with
//! `--watch`, follows their request manifests until each one finishes.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Context, Result};
use clap::Args;
use futures_util::StreamExt;
use pixsync_core::domain::{
    MissingContentSet, RenderingJobRecord, RenderingKind, RenderingSettings, RenderingStatus,
};
use pixsync_sync::{BufferingPolicy, ProjectSyncService};
use tracing::{info, warn};
use uuid::Uuid;

use super::{report_outcomes, wait_for_transfers, CommandContext, Engine};
use crate::output::OutputFormatter;

// ============================================================================
// jobs
// ============================================================================

#[derive(Debug, Args)]
pub struct JobsCommand {
    /// Follow every pending job until it finishes
    #[arg(long)]
    pub watch: bool,

    /// Additional request identifiers to follow with --watch
    #[arg(long = "track", value_name = "REQUEST")]
    pub track: Vec<Uuid>,
}

impl JobsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let engine = Engine::build(&ctx.config)?;

        let pending = engine
            .service
            .processing_jobs()
            .await
            .context("Failed to list rendering jobs")?;

        if !self.watch {
            print_pending(ctx, formatter.as_ref(), &pending);
            return Ok(());
        }

        let mut requests = pending_requests(&pending);
        requests.extend(self.track.iter().copied());
        if requests.is_empty() {
            formatter.success("No rendering jobs in progress");
            return Ok(());
        }

        let finished = watch(&engine.service, requests, ctx, formatter.as_ref()).await;
        if !ctx.is_json() {
            formatter.success(&format!("{} job(s) finished", finished.len()));
        }
        Ok(())
    }
}

fn print_pending(
    ctx: &CommandContext,
    formatter: &dyn OutputFormatter,
    pending: &BTreeMap<Uuid, MissingContentSet>,
) {
    if ctx.is_json() {
        let projects: serde_json::Map<String, serde_json::Value> = pending
            .iter()
            .map(|(project, outputs)| {
                (
                    project.to_string(),
                    serde_json::to_value(outputs).unwrap_or_default(),
                )
            })
            .collect();
        formatter.print_json(&serde_json::json!({ "processing": projects }));
        return;
    }

    if pending.is_empty() {
        formatter.success("No rendering jobs in progress");
        return;
    }

    let total: usize = pending.values().map(MissingContentSet::total).sum();
    formatter.success(&format!("{total} rendering job(s) in progress"));
    for (project, outputs) in pending {
        formatter.info(&format!("{project}:"));
        for (category, names) in outputs.iter() {
            for name in names {
                formatter.info(&format!("  {category}  {name}"));
            }
        }
    }
}

/// Request identifiers behind the pending output file names
fn pending_requests(pending: &BTreeMap<Uuid, MissingContentSet>) -> BTreeSet<Uuid> {
    pending
        .values()
        .flat_map(|outputs| {
            outputs
                .iter()
                .flat_map(|(_, names)| names.iter())
                .filter_map(|name| name.split('.').next())
                .filter_map(|stem| Uuid::parse_str(stem).ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Follows `requests` until each reaches a terminal status or Ctrl-C
///
/// # Returns
/// The terminal records seen
async fn watch(
    service: &ProjectSyncService,
    requests: BTreeSet<Uuid>,
    ctx: &CommandContext,
    formatter: &dyn OutputFormatter,
) -> Vec<RenderingJobRecord> {
    let mut updates = service.watch_jobs(BufferingPolicy::Unbounded);
    for request in &requests {
        service.track_job(*request);
    }

    let mut waiting = requests;
    let mut last_status: BTreeMap<Uuid, RenderingStatus> = BTreeMap::new();
    let mut finished = Vec::new();

    while !waiting.is_empty() {
        let record = tokio::select! {
            record = updates.next() => match record {
                Some(record) => record,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                formatter.warn("Interrupted, no longer following jobs");
                break;
            }
        };

        let Some(request) = record.request_id() else {
            continue;
        };
        if !waiting.contains(&request) || last_status.get(&request) == Some(&record.status) {
            continue;
        }
        last_status.insert(request, record.status);

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "request": request.to_string(),
                "model": record.id_model,
                "status": record.status.to_string(),
            }));
        } else {
            formatter.info(&format!("{request}  {}", record.status));
        }

        if record.is_terminal() {
            waiting.remove(&request);
            finished.push(record);
        }
    }

    service.shutdown();
    finished
}

// ============================================================================
// render
// ============================================================================

#[derive(Debug, Args)]
pub struct RenderCommand {
    /// Project whose model is rendered
    pub project: Uuid,

    /// Output kind: image or video
    #[arg(long, default_value = "image")]
    pub kind: RenderingKind,

    /// Camera path
    #[arg(long, default_value = "circleHorizontal")]
    pub flyby: String,

    /// Effect applied to the scene
    #[arg(long, default_value = "empty")]
    pub scene_effect: String,

    /// Effect applied after composition
    #[arg(long, default_value = "empty")]
    pub post_effect: String,

    /// Duration in seconds (videos)
    #[arg(long, default_value_t = 0.0)]
    pub duration: f64,

    /// First frame to render
    #[arg(long, default_value_t = 0)]
    pub start_frame: u32,

    /// Wait for the job and download its output
    #[arg(long)]
    pub wait: bool,
}

impl RenderCommand {
    fn settings(&self) -> RenderingSettings {
        RenderingSettings {
            kind: self.kind,
            flyby: self.flyby.clone(),
            scene_effect: self.scene_effect.clone(),
            post_effect: self.post_effect.clone(),
            duration: self.duration,
            start_frame: self.start_frame,
        }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        if self.kind == RenderingKind::Video && self.duration <= 0.0 {
            bail!("Video renderings need a positive --duration");
        }

        let engine = Engine::build(&ctx.config)?;
        let request = engine
            .service
            .submit_rendering(self.project, self.settings())
            .await
            .context("Failed to request rendering")?;

        info!(%request, project = %self.project, kind = %self.kind, "Rendering requested");
        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "request": request.to_string(),
                "project": self.project.to_string(),
                "kind": self.kind.to_string(),
            }));
        } else {
            formatter.success(&format!("Rendering requested ({request})"));
        }

        if !self.wait {
            engine.service.shutdown();
            return Ok(());
        }

        let finished = watch(
            &engine.service,
            BTreeSet::from([request]),
            ctx,
            formatter.as_ref(),
        )
        .await;

        match finished.first().map(|record| record.status) {
            Some(RenderingStatus::Done) => {
                let sessions = engine
                    .service
                    .sync_project_content(self.project)
                    .await
                    .context("Failed to start content sync")?;
                let outcomes =
                    wait_for_transfers(&sessions, formatter.as_ref(), !ctx.quiet).await;
                report_outcomes(ctx, formatter.as_ref(), "Render", &outcomes)
            }
            Some(_) => bail!("Rendering {request} failed"),
            None => {
                warn!(%request, "Stopped following rendering before it finished");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pixsync_core::domain::ContentCategory;

    use super::*;

    #[test]
    fn test_pending_requests_parses_output_stems() {
        let request = Uuid::new_v4();
        let mut outputs = MissingContentSet::new();
        outputs.insert(ContentCategory::Video, format!("{request}.mp4"));
        outputs.insert(ContentCategory::Image, "not-a-request.png");

        let pending = BTreeMap::from([(Uuid::new_v4(), outputs)]);
        assert_eq!(pending_requests(&pending), BTreeSet::from([request]));
    }

    #[test]
    fn test_render_settings_from_flags() {
        let command = RenderCommand {
            project: Uuid::nil(),
            kind: RenderingKind::Video,
            flyby: "circleHorizontal".into(),
            scene_effect: "empty".into(),
            post_effect: "bloom".into(),
            duration: 4.0,
            start_frame: 12,
            wait: false,
        };
        let settings = command.settings();
        assert_eq!(settings.kind, RenderingKind::Video);
        assert_eq!(settings.post_effect, "bloom");
        assert_eq!(settings.start_frame, 12);
    }
}
