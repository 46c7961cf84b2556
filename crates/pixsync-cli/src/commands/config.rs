//! Config command - View and manage PixSync configuration
//!
//! Provides the `pixsync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON), id token redacted
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use pixsync_core::config::Config;
use tracing::info;

use super::CommandContext;
use crate::output::OutputFormatter;

/// Placeholder shown instead of the id token
const REDACTED: &str = "<redacted>";

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sync.root", "Directory holding the project folders"),
    ("sync.transfer_concurrency", "Transfers running at once (1-32)"),
    ("sync.job_poll_interval", "Seconds between job manifest reads"),
    ("remote.api_url", "Web API base URL"),
    ("remote.renderer_queue", "Renderer queue name"),
    ("remote.request_timeout", "Seconds before an API request times out"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("auth.id_token", "Bearer credential, 'none' to clear"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.transfer_concurrency")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx).await,
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value).await,
            ConfigCommand::Validate => self.execute_validate(ctx).await,
        }
    }

    async fn execute_show(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = redacted(&ctx.config);

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    async fn execute_set(&self, ctx: &CommandContext, key: &str, value: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;
        // Environment overrides are not persisted.
        let mut config = Config::load_or_default(config_path);

        let shown = if key == "auth.id_token" { REDACTED } else { value };
        info!(key = %key, value = %shown, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (key, description) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {key:<28} - {description}"));
                }
            }
            return Ok(());
        }

        let errors: Vec<String> = config
            .validate()
            .iter()
            .filter(|e| e.field == key)
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
            }
            return Ok(());
        }

        save_config(&config, config_path)?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": shown,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, shown));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }
        Ok(())
    }

    async fn execute_validate(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        // Load the file explicitly; a parse error must not fall back to defaults.
        let config = match Config::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                report_unloadable(ctx, formatter.as_ref(), config_path, &e);
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if ctx.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }
}

fn report_unloadable(
    ctx: &CommandContext,
    formatter: &dyn OutputFormatter,
    config_path: &Path,
    error: &anyhow::Error,
) {
    let message = if config_path.exists() {
        format!("Failed to parse configuration: {error}")
    } else {
        "Configuration file not found. Using defaults.".to_string()
    };

    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "valid": false,
            "config_path": config_path.display().to_string(),
            "errors": [message],
        }));
    } else if config_path.exists() {
        formatter.error(&message);
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.info(&format!(
            "Configuration file not found at {}",
            config_path.display()
        ));
        formatter.info(
            "Using default configuration. Run 'pixsync config set <key> <value>' to create one.",
        );
    }
}

/// Copy of `config` that is safe to print
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.auth.id_token.is_some() {
        config.auth.id_token = Some(REDACTED.to_string());
    }
    config
}

fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml).context("Failed to write configuration file")?;
    Ok(())
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- sync ---
        "sync.root" => {
            config.sync.root = PathBuf::from(value);
        }
        "sync.transfer_concurrency" => {
            config.sync.transfer_concurrency = value
                .parse::<usize>()
                .context("Expected a positive integer for sync.transfer_concurrency")?;
        }
        "sync.job_poll_interval" => {
            config.sync.job_poll_interval = value
                .parse::<u64>()
                .context("Expected a positive integer for sync.job_poll_interval")?;
        }

        // --- remote ---
        "remote.api_url" => {
            config.remote.api_url = value.trim_end_matches('/').to_string();
        }
        "remote.renderer_queue" => {
            config.remote.renderer_queue = value.to_string();
        }
        "remote.request_timeout" => {
            config.remote.request_timeout = value
                .parse::<u64>()
                .context("Expected a positive integer for remote.request_timeout")?;
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }

        // --- auth ---
        "auth.id_token" => {
            config.auth.id_token = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}
