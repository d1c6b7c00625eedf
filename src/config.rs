//! Configuration management for tgstat
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section is optional; a missing section takes its defaults.

use crate::backfill::Resolution;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file looked up when no path is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "tgstat.toml";

/// Upper bound for `victoriametrics.request_timeout_seconds`
const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub inputs: InputsConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    #[serde(default)]
    pub victoriametrics: VictoriaMetricsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Where chat exports and their companion files live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputsConfig {
    /// Directory holding one sub-directory per chat export
    #[serde(default = "default_chat_exports_dir")]
    pub chat_exports_dir: PathBuf,
    /// File name of the export inside each sub-directory
    #[serde(default = "default_export_file_name")]
    pub export_file_name: String,
    /// JSON object mapping sender names to the name to report instead
    #[serde(default = "default_aliases_file")]
    pub aliases_file: PathBuf,
    /// JSON array of regular expressions to count in message text
    #[serde(default = "default_expressions_file")]
    pub expressions_file: PathBuf,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            chat_exports_dir: default_chat_exports_dir(),
            export_file_name: default_export_file_name(),
            aliases_file: default_aliases_file(),
            expressions_file: default_expressions_file(),
        }
    }
}

fn default_chat_exports_dir() -> PathBuf {
    PathBuf::from("chat-exports")
}

fn default_export_file_name() -> String {
    "result.json".to_string()
}

fn default_aliases_file() -> PathBuf {
    PathBuf::from("configs/aliases.json")
}

fn default_expressions_file() -> PathBuf {
    PathBuf::from("configs/expressions.json")
}

/// Resampling settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackfillConfig {
    /// Seconds between two rendered samples of a series
    #[serde(default = "default_resolution_seconds")]
    pub resolution_seconds: u64,
    /// Prefix of every metric name; also selects what gets deleted remotely
    #[serde(default = "default_metrics_prefix")]
    pub metrics_prefix: String,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            resolution_seconds: default_resolution_seconds(),
            metrics_prefix: default_metrics_prefix(),
        }
    }
}

impl BackfillConfig {
    /// The configured resolution as a validated step
    pub fn resolution(&self) -> AppResult<Resolution> {
        Ok(Resolution::from_secs(self.resolution_seconds)?)
    }
}

fn default_resolution_seconds() -> u64 {
    3600
}

fn default_metrics_prefix() -> String {
    "tg_".to_string()
}

/// VictoriaMetrics connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VictoriaMetricsConfig {
    #[serde(default = "default_victoriametrics_url")]
    pub url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for VictoriaMetricsConfig {
    fn default() -> Self {
        Self {
            url: default_victoriametrics_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_victoriametrics_url() -> String {
    "http://localhost:8428".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        let config: Self = toml::from_str(&content).map_err(|source| {
            AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Load the config named on the command line, or the default one
    ///
    /// An explicitly named file must exist. Without a name, a missing
    /// [`DEFAULT_CONFIG_PATH`] falls back to built-in defaults.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()` and `from_str()`, but can
    /// also be called explicitly after applying overrides.
    pub fn validate(&self) -> AppResult<()> {
        if self.backfill.resolution_seconds == 0 {
            return Err(AppError::Config(
                "backfill.resolution_seconds must be greater than 0".to_string(),
            ));
        }

        if !is_valid_metric_prefix(&self.backfill.metrics_prefix) {
            return Err(AppError::Config(format!(
                "backfill.metrics_prefix '{}' is not a valid metric name prefix. \
                Use letters, digits, '_' or ':' and do not start with a digit.",
                self.backfill.metrics_prefix
            )));
        }

        let url = &self.victoriametrics.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "victoriametrics.url '{}' must start with http:// or https://",
                url
            )));
        }

        let timeout = self.victoriametrics.request_timeout_seconds;
        if timeout == 0 || timeout > MAX_REQUEST_TIMEOUT_SECONDS {
            return Err(AppError::Config(format!(
                "victoriametrics.request_timeout_seconds must be in (0, {}], got {}",
                MAX_REQUEST_TIMEOUT_SECONDS, timeout
            )));
        }

        if self.inputs.export_file_name.is_empty() {
            return Err(AppError::Config(
                "inputs.export_file_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_valid_metric_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
