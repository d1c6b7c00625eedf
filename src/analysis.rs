//! Chat analysis
//!
//! Turns decoded chat exports into counter increments. Each message of a
//! named sender counts towards three series, all labeled with the export
//! file and the sender:
//!
//! - `<prefix>messages_total`: one per message
//! - `<prefix>bytes_total`: UTF-8 length of every text fragment
//! - `<prefix>expressions_total`: one per fragment matching an expression,
//!   additionally labeled with the expression
//!
//! Senders can be renamed through an alias file before counting, so that
//! one person appearing under several display names is reported once.

use crate::backfill::Metrics;
use crate::config::InputsConfig;
use crate::error::{AppError, AppResult};
use crate::tgexport::{self, ChatExport, Sender};
use regex::Regex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Sender display name to the name reported instead
pub type AliasMap = HashMap<Sender, Sender>;

/// Full metric names for a given prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNames {
    pub messages_total: String,
    pub bytes_total: String,
    pub expressions_total: String,
}

impl MetricNames {
    pub fn new(prefix: &str) -> Self {
        Self {
            messages_total: format!("{prefix}messages_total"),
            bytes_total: format!("{prefix}bytes_total"),
            expressions_total: format!("{prefix}expressions_total"),
        }
    }
}

/// Read a whole input file, treating a missing file as `None`
fn read_optional(path: &Path) -> AppResult<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(buf) => Ok(Some(buf)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(AppError::FileRead {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Load the sender alias file
///
/// A missing file is not an error: senders are then reported as they are.
pub fn load_aliases(path: &Path) -> AppResult<AliasMap> {
    let Some(buf) = read_optional(path)? else {
        tracing::info!(
            path = %path.display(),
            "Alias file not found, sender names will not be replaced"
        );
        return Ok(AliasMap::new());
    };

    let aliases: AliasMap = serde_json::from_slice(&buf).map_err(|source| AppError::JsonDecode {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), aliases = aliases.len(), "Loaded sender aliases");
    Ok(aliases)
}

/// Load and compile the expressions file
///
/// A missing file is not an error: no expressions are counted then.
pub fn load_expressions(path: &Path) -> AppResult<Vec<Regex>> {
    let Some(buf) = read_optional(path)? else {
        tracing::info!(
            path = %path.display(),
            "Expressions file not found, expressions will not be counted"
        );
        return Ok(Vec::new());
    };

    let patterns: Vec<String> =
        serde_json::from_slice(&buf).map_err(|source| AppError::JsonDecode {
            path: path.display().to_string(),
            source,
        })?;

    let expressions = patterns
        .into_iter()
        .map(|pattern| {
            Regex::new(&pattern).map_err(|source| AppError::InvalidExpression { pattern, source })
        })
        .collect::<AppResult<Vec<_>>>()?;
    tracing::debug!(
        path = %path.display(),
        expressions = expressions.len(),
        "Loaded expressions"
    );
    Ok(expressions)
}

/// Replace every aliased sender in place
pub fn apply_sender_aliases(export: &mut ChatExport, aliases: &AliasMap) {
    if aliases.is_empty() {
        return;
    }
    for message in &mut export.messages {
        if let Some(alias) = message.from.as_ref().and_then(|from| aliases.get(from)) {
            message.from = Some(alias.clone());
        }
    }
}

/// Record the increments of one chat export
///
/// Messages without a sender (service messages) are skipped.
pub fn analyze_chat(
    export: &ChatExport,
    metrics: &Metrics,
    expressions: &[Regex],
    names: &MetricNames,
) {
    for message in &export.messages {
        let Some(sender) = message.sender() else {
            continue;
        };
        let sender_metrics = metrics.with("sender", sender.as_str());

        sender_metrics
            .metric(&names.messages_total)
            .inc(1, message.date);

        for entity in &message.text_entities {
            sender_metrics
                .metric(&names.bytes_total)
                .inc(entity.text.len() as u64, message.date);

            for expression in expressions {
                if expression.is_match(&entity.text) {
                    sender_metrics
                        .metric(&names.expressions_total)
                        .with("expression", expression.as_str())
                        .inc(1, message.date);
                }
            }
        }
    }
}

/// Find every `<dir>/*/<file_name>`, sorted by path
///
/// A missing directory yields no files.
pub fn discover_exports(dir: &Path, file_name: &str) -> AppResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "Chat exports directory not found");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(AppError::FileRead {
                path: dir.display().to_string(),
                source,
            });
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let candidate = entry.path().join(file_name);
        if candidate.is_file() {
            files.push(candidate);
        }
    }
    files.sort();
    Ok(files)
}

/// Aliases, expressions and metric names used for a whole run
#[derive(Debug, Clone)]
pub struct Analyzer {
    aliases: AliasMap,
    expressions: Vec<Regex>,
    names: MetricNames,
}

impl Analyzer {
    pub fn new(aliases: AliasMap, expressions: Vec<Regex>, names: MetricNames) -> Self {
        Self {
            aliases,
            expressions,
            names,
        }
    }

    /// Load aliases and expressions from the configured files
    pub fn from_config(inputs: &InputsConfig, metrics_prefix: &str) -> AppResult<Self> {
        Ok(Self::new(
            load_aliases(&inputs.aliases_file)?,
            load_expressions(&inputs.expressions_file)?,
            MetricNames::new(metrics_prefix),
        ))
    }

    /// Read, alias and analyze every file into one set of metrics
    ///
    /// Each file's series carry a `file` label with the path as given.
    pub fn analyze_files(&self, files: &[PathBuf]) -> AppResult<Metrics> {
        let metrics = Metrics::new();
        for path in files {
            tracing::info!(path = %path.display(), "Analyzing chat export");
            let mut export = tgexport::read_file(path)?;
            apply_sender_aliases(&mut export, &self.aliases);

            let chat_metrics = metrics.with("file", path.display().to_string());
            analyze_chat(&export, &chat_metrics, &self.expressions, &self.names);
        }

        tracing::info!(
            files = files.len(),
            series = metrics.recorder().series_count(),
            "Analysis complete"
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::Resolution;

    fn export(json: &str) -> ChatExport {
        ChatExport::from_reader(json.as_bytes()).expect("valid export")
    }

    const CHAT: &str = r#"{"messages": [
        {"from": "Alice", "date": "2024-08-24T15:06:40",
         "text_entities": [{"type": "plain", "text": "lol ok"}]},
        {"from": "Bob", "date": "2024-08-24T15:07:00",
         "text_entities": [{"type": "plain", "text": "héllo"}, {"type": "bold", "text": "LOL"}]},
        {"actor": "Bob", "date": "2024-08-24T15:08:00", "text_entities": []},
        {"from": "Alice", "date": "2024-08-24T16:06:40",
         "text_entities": [{"type": "plain", "text": "nope"}]}
    ]}"#;

    #[test]
    fn test_metric_names_use_prefix() {
        let names = MetricNames::new("tg_");
        assert_eq!(names.messages_total, "tg_messages_total");
        assert_eq!(names.bytes_total, "tg_bytes_total");
        assert_eq!(names.expressions_total, "tg_expressions_total");
    }

    #[test]
    fn test_analyze_chat_counts_messages_bytes_and_expressions() {
        let metrics = Metrics::new();
        let expressions = vec![Regex::new("(?i)lol").unwrap()];
        analyze_chat(
            &export(CHAT),
            &metrics.with("file", "a.json"),
            &expressions,
            &MetricNames::new("tg_"),
        );

        let recorder = metrics.recorder();
        let alice = r#"{file="a.json",sender="Alice"}"#;
        let bob = r#"{file="a.json",sender="Bob"}"#;
        assert_eq!(recorder.total(&format!("tg_messages_total{alice}")), Some(2));
        assert_eq!(recorder.total(&format!("tg_messages_total{bob}")), Some(1));
        assert_eq!(recorder.total(&format!("tg_bytes_total{alice}")), Some(10));
        // "héllo" is 6 bytes
        assert_eq!(recorder.total(&format!("tg_bytes_total{bob}")), Some(9));
        assert_eq!(
            recorder.total(r#"tg_expressions_total{file="a.json",sender="Alice",expression="(?i)lol"}"#),
            Some(1)
        );
        assert_eq!(
            recorder.total(r#"tg_expressions_total{file="a.json",sender="Bob",expression="(?i)lol"}"#),
            Some(1)
        );
        assert_eq!(recorder.series_count(), 6);
    }

    #[test]
    fn test_analyze_chat_renders_hourly() {
        let metrics = Metrics::new();
        analyze_chat(&export(CHAT), &metrics, &[], &MetricNames::new("tg_"));

        let mut out = Vec::new();
        metrics
            .render(&mut out, Resolution::from_secs(3600).unwrap())
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("tg_messages_total{sender=\"Alice\"} 1 1724512000\n"));
        assert!(out.contains("tg_messages_total{sender=\"Alice\"} 2 1724515600\n"));
        assert!(out.contains("tg_messages_total{sender=\"Bob\"} 1 1724515600\n"));
    }

    #[test]
    fn test_apply_sender_aliases() {
        let mut chat = export(CHAT);
        let aliases: AliasMap = [(Sender::from("Bob"), Sender::from("Alice"))]
            .into_iter()
            .collect();
        apply_sender_aliases(&mut chat, &aliases);

        assert!(
            chat.messages
                .iter()
                .filter_map(|m| m.sender())
                .all(|s| s.as_str() == "Alice")
        );
    }

    #[test]
    fn test_missing_alias_and_expression_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_aliases(&dir.path().join("aliases.json")).unwrap().is_empty());
        assert!(
            load_expressions(&dir.path().join("expressions.json"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_invalid_expression_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expressions.json");
        std::fs::write(&path, r#"["ok", "(unclosed"]"#).unwrap();

        let err = load_expressions(&path).unwrap_err();
        assert!(matches!(err, AppError::InvalidExpression { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_malformed_alias_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(&path, r#"["not", "a", "map"]"#).unwrap();

        assert!(matches!(
            load_aliases(&path).unwrap_err(),
            AppError::JsonDecode { .. }
        ));
    }

    #[test]
    fn test_discover_exports_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b", "a", "empty"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("b/result.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a/result.json"), "{}").unwrap();
        std::fs::write(dir.path().join("stray.json"), "{}").unwrap();

        let files = discover_exports(dir.path(), "result.json").unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("a/result.json"),
                dir.path().join("b/result.json"),
            ]
        );
    }

    #[test]
    fn test_discover_exports_missing_dir_is_empty() {
        let files = discover_exports(Path::new("/nonexistent/chat-exports"), "result.json").unwrap();
        assert!(files.is_empty());
    }
}
