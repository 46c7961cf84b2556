//! Configuration module for PixSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `auth.id_token`.
pub const ID_TOKEN_ENV: &str = "PIXSYNC_ID_TOKEN";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for PixSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
}

/// Transfer and project-folder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory holding one folder per project.
    pub root: PathBuf,
    /// Maximum number of transfers running at once.
    pub transfer_concurrency: usize,
    /// Seconds between two reads of a rendering request manifest.
    pub job_poll_interval: u64,
}

/// Remote web API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the web API, without a trailing slash.
    pub api_url: String,
    /// Name of the renderer queue notified on new requests.
    pub renderer_queue: String,
    /// Seconds before an API request times out.
    pub request_timeout: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Authentication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer credential sent with every API call. `None` means every remote
    /// operation fails as unauthorized.
    pub id_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/pixsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("pixsync")
            .join("config.yaml")
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(ID_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.auth.id_token = Some(token);
            }
        }
        self
    }

    /// Poll interval as a [`Duration`].
    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.job_poll_interval)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("pixsync")
                .join("projects"),
            transfer_concurrency: 1,
            job_poll_interval: 5,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: "https://pixelrenderer-azurefunctions.azurewebsites.net/api".to_string(),
            renderer_queue: "debug".to_string(),
            request_timeout: 240,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.job_poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.transfer_concurrency == 0 || self.sync.transfer_concurrency > 32 {
            errors.push(ValidationError {
                field: "sync.transfer_concurrency".into(),
                message: "must be in range 1..=32".into(),
            });
        }
        if self.sync.job_poll_interval == 0 {
            errors.push(ValidationError {
                field: "sync.job_poll_interval".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.root.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: "must not be empty".into(),
            });
        }

        // --- remote ---
        let url = self.remote.api_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "remote.api_url".into(),
                message: format!("must be an http(s) URL: '{url}'"),
            });
        }
        if url.ends_with('/') {
            errors.push(ValidationError {
                field: "remote.api_url".into(),
                message: "must not end with '/'".into(),
            });
        }
        if self.remote.renderer_queue.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.renderer_queue".into(),
                message: "must not be empty".into(),
            });
        }
        if self.remote.request_timeout == 0 {
            errors.push(ValidationError {
                field: "remote.request_timeout".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- auth ---
        if matches!(&self.auth.id_token, Some(token) if token.trim().is_empty()) {
            errors.push(ValidationError {
                field: "auth.id_token".into(),
                message: "must not be blank when set".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use pixsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/Projects"))
///     .transfer_concurrency(2)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn transfer_concurrency(mut self, n: usize) -> Self {
        self.config.sync.transfer_concurrency = n;
        self
    }

    pub fn job_poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.job_poll_interval = seconds;
        self
    }

    // --- remote ---

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.api_url = url.into();
        self
    }

    pub fn renderer_queue(mut self, queue: impl Into<String>) -> Self {
        self.config.remote.renderer_queue = queue.into();
        self
    }

    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.config.remote.request_timeout = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- auth ---

    pub fn id_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth.id_token = Some(token.into());
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.transfer_concurrency, 1);
        assert_eq!(cfg.sync.job_poll_interval, 5);
        assert!(cfg.sync.root.to_string_lossy().contains("pixsync"));
        assert_eq!(
            cfg.remote.api_url,
            "https://pixelrenderer-azurefunctions.azurewebsites.net/api"
        );
        assert_eq!(cfg.remote.renderer_queue, "debug");
        assert_eq!(cfg.remote.request_timeout, 240);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.auth.id_token.is_none());
        assert_eq!(cfg.job_poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
sync:
  root: /tmp/pixsync-projects
  transfer_concurrency: 4
  job_poll_interval: 2
remote:
  api_url: http://localhost:7071/api
  renderer_queue: production
  request_timeout: 30
logging:
  level: debug
auth:
  id_token: "token-123"
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.root, PathBuf::from("/tmp/pixsync-projects"));
        assert_eq!(cfg.sync.transfer_concurrency, 4);
        assert_eq!(cfg.sync.job_poll_interval, 2);
        assert_eq!(cfg.remote.api_url, "http://localhost:7071/api");
        assert_eq!(cfg.remote.renderer_queue, "production");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.auth.id_token.as_deref(), Some("token-123"));
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_accepts_partial_file() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"logging:\n  level: warn\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.sync.transfer_concurrency, 1);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.job_poll_interval, 5);
    }

    #[test]
    fn load_error_names_missing_file() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = dir.path().join("absent.yaml");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains(&path.display().to_string()), "got {err}");
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("pixsync/config.yaml"));
    }

    // -- Validation --

    #[test]
    fn validate_catches_bad_concurrency() {
        let mut cfg = Config::default();
        cfg.sync.transfer_concurrency = 0;
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "sync.transfer_concurrency"));

        cfg.sync.transfer_concurrency = 64;
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "sync.transfer_concurrency"));
    }

    #[test]
    fn validate_catches_zero_intervals() {
        let mut cfg = Config::default();
        cfg.sync.job_poll_interval = 0;
        cfg.remote.request_timeout = 0;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"sync.job_poll_interval".to_string()));
        assert!(fields.contains(&"remote.request_timeout".to_string()));
    }

    #[test]
    fn validate_catches_bad_api_url() {
        let mut cfg = Config::default();
        cfg.remote.api_url = "ftp://example.com/".into();
        let errors = cfg.validate();
        assert_eq!(
            errors.iter().filter(|e| e.field == "remote.api_url").count(),
            2
        );
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".into();
        let errors = cfg.validate();
        let err = errors.iter().find(|e| e.field == "logging.level").unwrap();
        assert!(err.message.contains("verbose"));
        assert_eq!(
            err.to_string(),
            "logging.level: invalid level 'verbose'; valid options: trace, debug, info, warn, error"
        );
    }

    #[test]
    fn validate_catches_blank_token() {
        let cfg = ConfigBuilder::new().id_token("  ").build();
        assert!(cfg.validate().iter().any(|e| e.field == "auth.id_token"));
    }

    // -- Builder --

    #[test]
    fn builder_overrides_values() {
        let cfg = ConfigBuilder::new()
            .sync_root(PathBuf::from("/srv/projects"))
            .transfer_concurrency(3)
            .job_poll_interval(10)
            .api_url("http://127.0.0.1:8080/api")
            .renderer_queue("staging")
            .request_timeout(60)
            .logging_level("trace")
            .id_token("abc")
            .build();
        assert_eq!(cfg.sync.root, PathBuf::from("/srv/projects"));
        assert_eq!(cfg.sync.transfer_concurrency, 3);
        assert_eq!(cfg.sync.job_poll_interval, 10);
        assert_eq!(cfg.remote.api_url, "http://127.0.0.1:8080/api");
        assert_eq!(cfg.remote.renderer_queue, "staging");
        assert_eq!(cfg.remote.request_timeout, 60);
        assert_eq!(cfg.logging.level, "trace");
        assert_eq!(cfg.auth.id_token.as_deref(), Some("abc"));
    }

    #[test]
    fn build_validated_returns_errors() {
        let result = ConfigBuilder::new().transfer_concurrency(0).build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sync.transfer_concurrency");
    }

    #[test]
    fn yaml_roundtrip_preserves_values() {
        let cfg = ConfigBuilder::new().renderer_queue("nightly").build();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.remote.renderer_queue, "nightly");
    }
}
