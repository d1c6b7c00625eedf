//! tgstat command-line entry point
//!
//! Analyzes chat exports and either uploads the backfill to VictoriaMetrics
//! or writes it out for inspection.

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tgstat::analysis::Analyzer;
use tgstat::cli::{Cli, Command, generate_config_template};
use tgstat::config::{Config, DEFAULT_CONFIG_PATH};
use tgstat::error::AppResult;
use tgstat::telemetry;
use tgstat::victoria::{self, VictoriaMetricsClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = &cli.command {
        write_config_template(output.as_deref())?;
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    telemetry::init(&config.observability.log_level);
    log_config_source(&cli);

    run(&cli, &config).await?;
    Ok(())
}

async fn run(cli: &Cli, config: &Config) -> AppResult<()> {
    let resolution = config.backfill.resolution()?;
    let analyzer = Analyzer::from_config(&config.inputs, &config.backfill.metrics_prefix)?;
    let files = cli.input_files(&config.inputs)?;
    let metrics = analyzer.analyze_files(&files)?;

    if let Some(Command::Render { output, .. }) = &cli.command {
        match output {
            Some(path) => {
                metrics.render(File::create(path)?, resolution)?;
                tracing::info!(path = %path.display(), "Wrote backfill");
            }
            None => metrics.render(std::io::stdout().lock(), resolution)?,
        }
        return Ok(());
    }

    let body = victoria::encode_gzip(&metrics, resolution)?;

    let client = VictoriaMetricsClient::from_config(&config.victoriametrics)?;
    tracing::info!(url = %client.base_url(), "Uploading to VictoriaMetrics");
    client
        .replace_series(&config.backfill.metrics_prefix, body)
        .await?;

    tracing::info!("Done");
    Ok(())
}

fn write_config_template(output: Option<&Path>) -> AppResult<()> {
    let template = generate_config_template();
    match output {
        Some(path) => {
            std::fs::write(path, template)?;
            eprintln!("Wrote configuration template to {}", path.display());
        }
        None => std::io::stdout().lock().write_all(template.as_bytes())?,
    }
    Ok(())
}

fn log_config_source(cli: &Cli) {
    match &cli.config {
        Some(path) => tracing::info!(path = %path.display(), "Loaded configuration"),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            tracing::info!(path = DEFAULT_CONFIG_PATH, "Loaded configuration")
        }
        None => tracing::info!(
            path = DEFAULT_CONFIG_PATH,
            "Config file not found, using defaults"
        ),
    }
}
