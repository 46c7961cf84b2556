//! PixSync CLI - Command-line interface for PixSync
//!
//! Provides commands for:
//! - Inspecting project sync status and missing renders
//! - Uploading, downloading and importing projects
//! - Requesting renderings and following rendering jobs
//! - Viewing and editing configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pixsync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    config::ConfigCommand,
    jobs::{JobsCommand, RenderCommand},
    missing::MissingCommand,
    projects::{DeleteCommand, RefreshCommand},
    status::StatusCommand,
    transfer::{DownloadCommand, ImportCommand, SyncCommand, UploadCommand},
    CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "pixsync", version, about = "Sync 3D projects and their renders")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show project sync status
    Status(StatusCommand),
    /// List remote renders missing locally
    Missing(MissingCommand),
    /// Download every missing render of a project
    Sync(SyncCommand),
    /// Download a project's model
    Download(DownloadCommand),
    /// Import a model file as a new project
    Import(ImportCommand),
    /// Upload a project's model
    Upload(UploadCommand),
    /// List or follow rendering jobs
    Jobs(JobsCommand),
    /// Request a rendering of a project
    Render(RenderCommand),
    /// Record cloud projects missing from the local catalog
    Refresh(RefreshCommand),
    /// Delete a project locally and remotely
    Delete(DeleteCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path).with_env_overrides();

    // Setup tracing
    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let ctx = CommandContext {
        config,
        config_path,
        format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Missing(cmd) => cmd.execute(&ctx).await,
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Download(cmd) => cmd.execute(&ctx).await,
        Commands::Import(cmd) => cmd.execute(&ctx).await,
        Commands::Upload(cmd) => cmd.execute(&ctx).await,
        Commands::Jobs(cmd) => cmd.execute(&ctx).await,
        Commands::Render(cmd) => cmd.execute(&ctx).await,
        Commands::Refresh(cmd) => cmd.execute(&ctx).await,
        Commands::Delete(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
