//! Migration log.
//!
//! Three severities: `Error` for failed mappings (missing asset IDs,
//! unparseable embeds), `Warning` for planned exclusions and downgrades,
//! `Info` for successful mappings. Entries accumulate per page, are
//! rendered into the destination document's summary field, and are appended
//! to a global JSONL stream one page at a time so a batch run is resumable.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::xml::escape_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LogStats {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

/// Per-page, append-only migration log.
#[derive(Debug)]
pub struct MigrationLog {
    pub page_path: String,
    pub file_path: String,
    entries: Vec<LogEntry>,
}

impl MigrationLog {
    pub fn new(page_path: &str, file_path: &str) -> Self {
        Self {
            page_path: page_path.to_string(),
            file_path: file_path.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into(), None);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into(), None);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message.into(), None);
    }

    pub fn warning_with(&mut self, message: impl Into<String>, context: impl Into<String>) {
        self.push(Severity::Warning, message.into(), Some(context.into()));
    }

    pub fn error_with(&mut self, message: impl Into<String>, context: impl Into<String>) {
        self.push(Severity::Error, message.into(), Some(context.into()));
    }

    fn push(&mut self, severity: Severity, message: String, context: Option<String>) {
        self.entries.push(LogEntry {
            severity,
            message,
            context,
            timestamp: now_timestamp_string(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.severity == Severity::Error)
    }

    pub fn stats(&self) -> LogStats {
        let mut stats = LogStats::default();
        for entry in &self.entries {
            match entry.severity {
                Severity::Error => stats.errors += 1,
                Severity::Warning => stats.warnings += 1,
                Severity::Info => stats.info += 1,
            }
        }
        stats
    }

    /// Render the accumulated entries for the destination summary field:
    /// a nested list grouped by severity, errors first.
    pub fn render_summary(&self) -> String {
        if self.entries.is_empty() {
            return "<p>No migration log entries.</p>".to_string();
        }
        let mut output = String::from("<ul>");
        for severity in [Severity::Error, Severity::Warning, Severity::Info] {
            let group = self
                .entries
                .iter()
                .filter(|entry| entry.severity == severity)
                .collect::<Vec<_>>();
            if group.is_empty() {
                continue;
            }
            output.push_str("<li>");
            output.push_str(severity.as_str());
            output.push_str("<ul>");
            for entry in group {
                output.push_str("<li>");
                output.push_str(&escape_text(&entry.message));
                if let Some(context) = &entry.context {
                    output.push_str(" (");
                    output.push_str(&escape_text(context));
                    output.push(')');
                }
                output.push_str("</li>");
            }
            output.push_str("</ul></li>");
        }
        output.push_str("</ul>");
        output
    }

    /// Append this page's entries to the global JSONL stream, one record
    /// per line. Creates the file and its parent directory on first use.
    pub fn append_to_stream(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        for entry in &self.entries {
            let record = StreamRecord {
                file_path: &self.file_path,
                page_path: &self.page_path,
                level: entry.severity.as_str(),
                message: &entry.message,
                context: entry.context.as_deref(),
                timestamp: &entry.timestamp,
            };
            let line = serde_json::to_string(&record).context("failed to encode log record")?;
            writeln!(file, "{line}").with_context(|| format!("failed to write {}", path.display()))?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StreamRecord<'a> {
    file_path: &'a str,
    page_path: &'a str,
    level: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    timestamp: &'a str,
}

/// Aggregated view of a global log stream, for the `report` command.
#[derive(Debug, Default, Serialize)]
pub struct StreamSummary {
    pub total_entries: usize,
    pub pages: usize,
    pub by_level: LogStats,
    pub errors_by_file: BTreeMap<String, Vec<String>>,
    pub warnings_by_file: BTreeMap<String, Vec<String>>,
}

/// Read a JSONL log stream back and fold it into per-file groups.
/// Unreadable lines are skipped rather than failing the report.
pub fn summarize_stream(path: &Path) -> Result<StreamSummary> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut summary = StreamSummary::default();
    let mut pages = std::collections::HashSet::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let file_path = record
            .get("file_path")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let message = record
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Some(page) = record.get("page_path").and_then(Value::as_str) {
            pages.insert(page.to_string());
        }
        summary.total_entries += 1;
        match record.get("level").and_then(Value::as_str) {
            Some("ERROR") => {
                summary.by_level.errors += 1;
                summary.errors_by_file.entry(file_path).or_default().push(message);
            }
            Some("WARNING") => {
                summary.by_level.warnings += 1;
                summary
                    .warnings_by_file
                    .entry(file_path)
                    .or_default()
                    .push(message);
            }
            _ => summary.by_level.info += 1,
        }
    }
    summary.pages = pages.len();
    Ok(summary)
}

pub fn now_timestamp_string() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
