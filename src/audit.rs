//! Audit trail
//!
//! Every template and every job leaves one [`Record`]. Records are handed to
//! an [`AuditSink`], an append-only collaborator that serializes its own
//! writes. The default sink appends JSON lines to `~/.local/mus/history.jsonl`.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// What a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A parsed template
    Macro,
    /// One job of a template
    Job,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Macro => write!(f, "macro"),
            Self::Job => write!(f, "job"),
        }
    }
}

/// One entry of the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unique id (uuid v4)
    pub uid: String,
    /// What the record describes
    pub kind: RecordKind,
    /// Free text; for templates the raw text, for jobs the run/skip notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Command line, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cl: Option<String>,
    /// Host the record was made on
    pub host: String,
    /// User the record was made by
    pub user: String,
    /// Working directory
    pub cwd: String,
    /// Creation time, replaced by the start time for jobs that run
    pub time: DateTime<Utc>,
    /// Exit status for jobs (-1 when killed by a signal or not started)
    #[serde(default)]
    pub status: i32,
    /// Input file the record refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Parent record id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_of: Option<String>,
    /// Configured tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Extra structured data (runtime, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Append a line to the message
    pub fn add_message(&mut self, text: &str) {
        match &mut self.message {
            None => self.message = Some(text.to_string()),
            Some(m) => {
                let trimmed = m.trim_end_matches('\n').len();
                m.truncate(trimmed);
                m.push('\n');
                m.push_str(text);
            },
        }
    }
}

/// Process, user and host context stamped on every record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    /// Host name
    pub host: String,
    /// User name
    pub user: String,
    /// Tags from configuration
    pub tags: Vec<String>,
}

impl RecordContext {
    /// Build the context from configuration and the environment
    ///
    /// `MUS_HOST` / `MUS_USER` win over the configuration, which wins over
    /// what the system reports.
    #[must_use]
    pub fn detect(config: &Config) -> Self {
        let host = std::env::var("MUS_HOST")
            .ok()
            .or_else(|| config.host.clone())
            .or_else(system_hostname)
            .unwrap_or_else(|| "unknown".to_string());
        let user = std::env::var("MUS_USER")
            .ok()
            .or_else(|| config.user.clone())
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            host,
            user,
            tags: config.tags(),
        }
    }

    /// Create a fresh record with a new id
    #[must_use]
    pub fn record(
        &self,
        kind: RecordKind,
        message: Option<&str>,
        input_file: Option<&Path>,
        parent: Option<&str>,
    ) -> Record {
        let cwd = std::env::current_dir().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
        Record {
            uid: uuid::Uuid::new_v4().to_string(),
            kind,
            message: message.map(String::from),
            cl: None,
            host: self.host.clone(),
            user: self.user.clone(),
            cwd,
            time: Utc::now(),
            status: 0,
            filename: input_file.map(|p| {
                p.canonicalize()
                    .unwrap_or_else(|_| p.to_path_buf())
                    .to_string_lossy()
                    .into_owned()
            }),
            child_of: parent.map(String::from),
            tags: self.tags.clone(),
            data: serde_json::Map::new(),
        }
    }
}

fn system_hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| fs::read_to_string("/proc/sys/kernel/hostname").ok())
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

/// Append-only store for audit records
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    /// Create a new record with id, timestamp, context and tags filled in
    fn prepare(
        &self,
        kind: RecordKind,
        message: Option<&str>,
        input_file: Option<&Path>,
        parent: Option<&str>,
    ) -> Record;

    /// Persist a record
    fn save(&self, record: &Record) -> anyhow::Result<()>;

    /// Append text to a record's message
    fn add_message(&self, record: &mut Record, text: &str) {
        record.add_message(text);
    }

    /// Most recent record whose id starts with `prefix`
    fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Option<Record>>;
}

/// Audit sink writing one JSON object per line
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    context: RecordContext,
    lock: Mutex<()>,
}

impl JsonlSink {
    /// Create a sink appending to `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, context: RecordContext) -> Self {
        Self {
            path: path.into(),
            context,
            lock: Mutex::new(()),
        }
    }

    /// File the sink appends to
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlSink {
    fn prepare(
        &self,
        kind: RecordKind,
        message: Option<&str>,
        input_file: Option<&Path>,
        parent: Option<&str>,
    ) -> Record {
        self.context.record(kind, message, input_file, parent)
    }

    fn save(&self, record: &Record) -> anyhow::Result<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self.lock.lock().map_err(|_| anyhow::anyhow!("audit sink lock poisoned"))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("cannot open {}", self.path.display()))?;
        writeln!(file, "{line}")?;
        log::debug!("saved {} record {}", record.kind, record.uid);
        Ok(())
    }

    fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Option<Record>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = fs::File::open(&self.path)?;
        let mut found = None;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(&line) {
                Ok(record) if record.uid.starts_with(prefix) => found = Some(record),
                Ok(_) => {},
                Err(e) => log::warn!("skipping unreadable history line: {e}"),
            }
        }
        Ok(found)
    }
}
