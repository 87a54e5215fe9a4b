//! Append-only audit trail of traversal and ingestion events.
//!
//! One line per event. Fields are joined by [`SEPARATOR`], a character not
//! expected in paths, so consumers can split lines back into fields with
//! [`parse_line`]. The first field is the local timestamp, the second the
//! action, the rest are action-specific context.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime};

pub const SEPARATOR: char = '\u{263a}';

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Traversal began at a root.
    Start,
    /// A source path is being processed.
    Analysis,
    /// A source path was skipped.
    Ignore,
    /// A file was copied and committed.
    Import,
    /// Duplicate content was linked to its existing record.
    Link,
    /// The visited-node ceiling stopped traversal.
    Limit,
    Finish,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "START",
            Action::Analysis => "ANALYSIS",
            Action::Ignore => "IGNORE",
            Action::Import => "IMPORT",
            Action::Link => "LINK",
            Action::Limit => "LIMIT",
            Action::Finish => "FINISH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let action = match s {
            "START" => Action::Start,
            "ANALYSIS" => Action::Analysis,
            "IGNORE" => Action::Ignore,
            "IMPORT" => Action::Import,
            "LINK" => Action::Link,
            "LIMIT" => Action::Limit,
            "FINISH" => Action::Finish,
            _ => return None,
        };
        Some(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed event line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub timestamp: NaiveDateTime,
    pub action: Action,
    pub fields: Vec<String>,
}

/// Writer side of the event log. Every line is flushed as it is written so
/// the trail survives an abort.
pub struct EventLog {
    out: Box<dyn Write + Send>,
}

impl EventLog {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open event log: {}", path.display()))?;
        Ok(Self::from_writer(file))
    }

    pub fn from_writer<W: Write + Send + 'static>(out: W) -> Self {
        Self { out: Box::new(out) }
    }

    /// A log that discards everything.
    pub fn sink() -> Self {
        Self::from_writer(std::io::sink())
    }

    pub fn record(&mut self, action: Action, fields: &[&str]) -> std::io::Result<()> {
        let line = format_line(&Local::now().naive_local(), action, fields);
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn format_line(timestamp: &NaiveDateTime, action: Action, fields: &[&str]) -> String {
    let mut line = timestamp.format(TIMESTAMP_FORMAT).to_string();
    line.push(SEPARATOR);
    line.push_str(action.as_str());
    for field in fields {
        line.push(SEPARATOR);
        line.push_str(field);
    }
    line
}

pub fn parse_line(line: &str) -> Result<EventRecord> {
    let mut parts = line.trim_end_matches(['\r', '\n']).split(SEPARATOR);
    let timestamp = parts
        .next()
        .ok_or_else(|| anyhow!("empty event line"))?;
    let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .with_context(|| format!("bad event timestamp: {}", timestamp))?;
    let action = parts
        .next()
        .ok_or_else(|| anyhow!("event line has no action"))?;
    let action = Action::parse(action).ok_or_else(|| anyhow!("unknown action: {}", action))?;

    Ok(EventRecord {
        timestamp,
        action,
        fields: parts.map(str::to_string).collect(),
    })
}

/// Parse every line of an event log file.
pub fn read_log(path: &Path) -> Result<Vec<EventRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event log: {}", path.display()))?;
    text.lines()
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}
