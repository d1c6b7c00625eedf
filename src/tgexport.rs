//! Reader for Telegram chat exports
//!
//! Telegram Desktop exports a chat as a `result.json` document. Only the
//! fields needed for statistics are decoded; everything else is ignored.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Timestamp format of the `date` field. It carries no offset and is read as UTC.
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A decoded `result.json`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatExport {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Display name of a message author
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Sender(String);

impl Sender {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Sender {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Absent or null for service messages
    #[serde(default)]
    pub from: Option<Sender>,
    #[serde(default)]
    pub text_entities: Vec<TextEntity>,
    #[serde(deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,
}

impl Message {
    /// The sender, if the message has a non-empty one
    pub fn sender(&self) -> Option<&Sender> {
        self.from.as_ref().filter(|s| !s.is_empty())
    }
}

/// One formatted fragment of a message's text
#[derive(Debug, Clone, Deserialize)]
pub struct TextEntity {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&raw, DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid date {raw:?}: {e}")))
}

impl ChatExport {
    /// Decode an export from any reader
    pub fn from_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }
}

/// Read and decode the export at `path`
pub fn read_file<P: AsRef<Path>>(path: P) -> AppResult<ChatExport> {
    let path_display = path.as_ref().display().to_string();

    let file = File::open(path.as_ref()).map_err(|source| AppError::FileRead {
        path: path_display.clone(),
        source,
    })?;

    let export = ChatExport::from_reader(BufReader::new(file)).map_err(|source| {
        AppError::JsonDecode {
            path: path_display.clone(),
            source,
        }
    })?;

    tracing::debug!(
        path = %path_display,
        messages = export.messages.len(),
        "Read chat export"
    );
    Ok(export)
}
