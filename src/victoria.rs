//! VictoriaMetrics import client
//!
//! Rendered backfills are gzipped and posted to the Prometheus text import
//! endpoint. Because a backfill always covers the whole history, series with
//! the configured prefix are deleted first so that stale series (renamed
//! senders, removed expressions) do not linger.

use crate::backfill::{Metrics, Resolution};
use crate::config::VictoriaMetricsConfig;
use crate::error::{AppError, AppResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::StatusCode;
use reqwest::header::CONTENT_ENCODING;
use std::time::Duration;

pub const IMPORT_PATH: &str = "/api/v1/import/prometheus";
pub const DELETE_SERIES_PATH: &str = "/api/v1/admin/tsdb/delete_series";

/// Render `metrics` into a gzip-compressed import body
pub fn encode_gzip(metrics: &Metrics, resolution: Resolution) -> AppResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    metrics.render(&mut encoder, resolution)?;
    Ok(encoder.finish()?)
}

/// Series selector matching every metric whose name starts with `prefix`
pub fn prefix_selector(prefix: &str) -> String {
    format!("{{__name__=~\"{prefix}.*\"}}")
}

/// Client for one VictoriaMetrics instance
#[derive(Debug, Clone)]
pub struct VictoriaMetricsClient {
    base_url: String,
    http: reqwest::Client,
}

impl VictoriaMetricsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| AppError::Http {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { base_url, http })
    }

    pub fn from_config(config: &VictoriaMetricsConfig) -> AppResult<Self> {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Delete every series whose metric name starts with `prefix`
    pub async fn delete_series(&self, prefix: &str) -> AppResult<()> {
        let url = format!("{}{}", self.base_url, DELETE_SERIES_PATH);
        let selector = prefix_selector(prefix);

        let response = self
            .http
            .get(&url)
            .query(&[("match[]", selector.as_str())])
            .send()
            .await
            .map_err(|source| AppError::Http {
                url: url.clone(),
                source,
            })?;
        expect_no_content(url, response.status())?;

        tracing::info!(selector = %selector, "Deleted existing series");
        Ok(())
    }

    /// Post a gzip-compressed Prometheus text body
    pub async fn import_gzip(&self, body: Vec<u8>) -> AppResult<()> {
        let url = format!("{}{}", self.base_url, IMPORT_PATH);
        let bytes = body.len();

        let response = self
            .http
            .post(&url)
            .header(CONTENT_ENCODING, "gzip")
            .body(body)
            .send()
            .await
            .map_err(|source| AppError::Http {
                url: url.clone(),
                source,
            })?;
        expect_no_content(url, response.status())?;

        tracing::info!(compressed_bytes = bytes, "Imported backfill");
        Ok(())
    }

    /// Replace every series under `prefix` with the contents of `body`
    ///
    /// `body` must already be rendered, so that a failed render can never
    /// leave the database emptied.
    pub async fn replace_series(&self, prefix: &str, body: Vec<u8>) -> AppResult<()> {
        self.delete_series(prefix).await?;
        self.import_gzip(body).await
    }
}

fn expect_no_content(url: String, status: StatusCode) -> AppResult<()> {
    if status == StatusCode::NO_CONTENT {
        Ok(())
    } else {
        tracing::error!(url = %url, status = %status, "Unexpected response from VictoriaMetrics");
        Err(AppError::UnexpectedStatus { url, status })
    }
}
