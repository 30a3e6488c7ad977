//! Jobs
//!
//! A [`Job`] is one rendered command line plus everything needed to decide
//! whether to run it and to account for it afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audit::Record;
use crate::error::RenderError;
use crate::template::{Binding, SlotValue, Template};

/// File set a rendered value is recorded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTag {
    /// Read by the command; compared against outputs
    Input,
    /// Written by the command
    Output,
    /// Must exist, but is ignored for the up-to-date check
    Extra,
}

/// One advisory vote on whether a job should run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvisoryVote {
    /// `true` to run, `false` to skip
    pub allow: bool,
    /// Why
    pub reason: String,
}

impl AdvisoryVote {
    /// Vote to run
    #[must_use]
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allow: true,
            reason: reason.into(),
        }
    }

    /// Vote to skip
    #[must_use]
    pub fn veto(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
        }
    }
}

/// One concrete command to run
#[derive(Debug, Clone)]
pub struct Job {
    /// Job id, shared with its audit record
    pub id: String,
    /// Rendered command line
    pub command_line: String,
    /// Values bound to each input slot
    pub data: BTreeMap<String, SlotValue>,
    /// Rendered form of each input slot
    pub rendered: BTreeMap<String, String>,
    /// Files tagged as inputs
    pub inputs: BTreeSet<PathBuf>,
    /// Files tagged as outputs
    pub outputs: BTreeSet<PathBuf>,
    /// Files tagged as extra requirements
    pub extras: BTreeSet<PathBuf>,
    /// Accumulated advisory votes
    pub votes: Vec<AdvisoryVote>,
    /// Set when the process is launched
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the process has exited
    pub stopped_at: Option<DateTime<Utc>>,
    /// Exit code; `None` when killed by a signal or never spawned
    pub exit_code: Option<i32>,
    /// Audit record, saved once the job is done or skipped
    pub record: Record,
}

impl Job {
    /// Create an empty job owning `record`
    #[must_use]
    pub fn new(record: Record) -> Self {
        Self {
            id: record.uid.clone(),
            command_line: String::new(),
            data: BTreeMap::new(),
            rendered: BTreeMap::new(),
            inputs: BTreeSet::new(),
            outputs: BTreeSet::new(),
            extras: BTreeSet::new(),
            votes: Vec::new(),
            started_at: None,
            stopped_at: None,
            exit_code: None,
            record,
        }
    }

    /// Build a job by rendering `binding` into `template`
    pub fn from_binding(template: &Template, binding: &Binding, record: Record) -> Result<Self, RenderError> {
        let mut job = Self::new(record);
        job.data = binding.iter().map(|(name, value)| (name.to_string(), value.clone())).collect();
        let command_line = template.render(binding, &mut job)?;
        job.command_line = command_line;
        job.record.cl = Some(job.command_line.clone());
        if let Some(first) = job.inputs.iter().next() {
            job.record.filename = Some(first.to_string_lossy().into_owned());
        }
        Ok(job)
    }

    /// Record `value` into one of the file sets
    pub fn tag_file(&mut self, tag: FileTag, value: &str) {
        let path = PathBuf::from(value);
        let set = match tag {
            FileTag::Input => &mut self.inputs,
            FileTag::Output => &mut self.outputs,
            FileTag::Extra => &mut self.extras,
        };
        set.insert(path);
    }

    /// Add an advisory vote
    pub fn add_vote(&mut self, vote: AdvisoryVote) {
        log::debug!("job {} vote {}: {}", self.id, vote.allow, vote.reason);
        self.votes.push(vote);
    }

    /// Combined advice: run only if no vote vetoes
    ///
    /// The reason lists every veto, comma separated.
    #[must_use]
    pub fn run_advice(&self) -> (bool, String) {
        let vetoes: Vec<&str> = self
            .votes
            .iter()
            .filter(|v| !v.allow)
            .map(|v| v.reason.as_str())
            .collect();
        (vetoes.is_empty(), vetoes.join(", "))
    }

    /// Mark the job as started
    pub fn start(&mut self) {
        let now = Utc::now();
        self.started_at = Some(now);
        self.record.time = now;
    }

    /// Mark the job as stopped with its exit code
    pub fn stop(&mut self, exit_code: Option<i32>) {
        self.stopped_at = Some(Utc::now());
        self.exit_code = exit_code;
    }

    /// Wall time between start and stop
    #[must_use]
    pub fn runtime(&self) -> Option<Duration> {
        match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => (stop - start).to_std().ok(),
            _ => None,
        }
    }

    /// Copy the outcome of the run into the audit record
    pub fn finalize_record(&mut self) {
        self.record.cl = Some(self.command_line.clone());
        self.record.status = self.exit_code.unwrap_or(-1);
        if let Some(start) = self.started_at {
            self.record.time = start;
        }
        if let Some(runtime) = self.runtime() {
            self.record
                .data
                .insert("runtime".to_string(), serde_json::json!(runtime.as_secs_f64()));
        }
    }
}
