//! Command-line interface for tgstat
//!
//! Provides argument parsing and subcommand handling for the tgstat binary.

use crate::analysis;
use crate::config::{Config, InputsConfig};
use crate::error::AppResult;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Backfill Telegram chat statistics into VictoriaMetrics
#[derive(Parser)]
#[command(name = "tgstat")]
#[command(version)]
#[command(about = "Backfill Telegram chat statistics into VictoriaMetrics")]
#[command(
    long_about = "tgstat reads Telegram chat exports, counts messages, bytes and \
    expression matches per sender, and replaces the matching series in \
    VictoriaMetrics with an evenly sampled history."
)]
pub struct Cli {
    /// Path to configuration file [default: tgstat.toml, if present]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// VictoriaMetrics base URL, overrides the configuration file
    #[arg(long, env = "VICTORIAMETRICS_URL", global = true)]
    pub victoriametrics_url: Option<String>,

    /// Seconds between two samples, overrides the configuration file
    #[arg(short, long, global = true)]
    pub resolution: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze chat exports and replace their series in VictoriaMetrics (default)
    Upload {
        /// Export files to analyze instead of the configured directory
        files: Vec<PathBuf>,
    },
    /// Analyze chat exports and print the backfill instead of uploading it
    Render {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export files to analyze instead of the configured directory
        files: Vec<PathBuf>,
    },
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.victoriametrics_url {
            config.victoriametrics.url = url.clone();
        }
        if let Some(resolution) = self.resolution {
            config.backfill.resolution_seconds = resolution;
        }
    }

    /// Files named on the command line, if any
    pub fn explicit_files(&self) -> &[PathBuf] {
        match &self.command {
            Some(Command::Upload { files }) | Some(Command::Render { files, .. }) => files.as_slice(),
            _ => &[],
        }
    }

    /// Export files to analyze: the explicit ones, or everything discovered
    pub fn input_files(&self, inputs: &InputsConfig) -> AppResult<Vec<PathBuf>> {
        let explicit = self.explicit_files();
        if !explicit.is_empty() {
            return Ok(explicit.to_vec());
        }
        analysis::discover_exports(&inputs.chat_exports_dir, &inputs.export_file_name)
    }
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# tgstat Configuration
# =====================
#
# Every section and every key is optional. Missing values take the defaults
# shown below.

# ─────────────────────────────────────────────────────────────────────────────
# INPUTS
# ─────────────────────────────────────────────────────────────────────────────

[inputs]
# Directory with one sub-directory per Telegram chat export
chat_exports_dir = "chat-exports"

# Name of the export file inside each sub-directory
export_file_name = "result.json"

# JSON object mapping sender names to the name to report instead,
# e.g. {"Bob (work)": "Bob"}. Ignored if the file does not exist.
aliases_file = "configs/aliases.json"

# JSON array of regular expressions to count in message text,
# e.g. ["(?i)lol", "🙈"]. Ignored if the file does not exist.
expressions_file = "configs/expressions.json"

# ─────────────────────────────────────────────────────────────────────────────
# BACKFILL
# ─────────────────────────────────────────────────────────────────────────────

[backfill]
# Seconds between two samples of a series
resolution_seconds = 3600

# Prefix of every metric name. Existing series with this prefix are deleted
# before each upload.
metrics_prefix = "tg_"

# ─────────────────────────────────────────────────────────────────────────────
# VICTORIAMETRICS
# ─────────────────────────────────────────────────────────────────────────────

[victoriametrics]
# Base URL (the VICTORIAMETRICS_URL environment variable takes precedence)
url = "http://localhost:8428"

# Timeout for each request in seconds (1-300)
request_timeout_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"
"#
}
