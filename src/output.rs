//! Output formatting for human and JSON modes
//!
//! Command results can be rendered either as human-readable text or as
//! machine-parseable JSON.

use std::collections::BTreeMap;

use colored::Colorize;
use serde::Serialize;

use crate::job::Job;
use crate::util::format_duration;

/// Output mode for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output (machine-readable)
    Json,
}

/// What happened to one job
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    /// Job id
    pub id: String,
    /// Rendered command line
    pub command_line: String,
    /// Exit code, `None` for skipped jobs and signals
    pub exit_code: Option<i32>,
    /// Runtime in milliseconds
    pub runtime_ms: Option<u128>,
    /// Veto reasons, when the job was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl JobOutcome {
    /// Outcome of a job that ran
    #[must_use]
    pub fn finished(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            command_line: job.command_line.clone(),
            exit_code: job.exit_code,
            runtime_ms: job.runtime().map(|d| d.as_millis()),
            skipped: None,
        }
    }

    /// Outcome of a job an advisory vote skipped
    #[must_use]
    pub fn skipped(job: &Job, reason: &str) -> Self {
        Self {
            id: job.id.clone(),
            command_line: job.command_line.clone(),
            exit_code: None,
            runtime_ms: None,
            skipped: Some(reason.to_string()),
        }
    }

    /// True when the job ran and exited with 0
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.skipped.is_none() && self.exit_code == Some(0)
    }
}

/// Result of running one template
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Raw template text
    pub template: String,
    /// Per-job outcomes in completion order
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    /// Number of jobs that ran
    #[must_use]
    pub fn executed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.skipped.is_none()).count()
    }

    /// Number of jobs that ran and failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.skipped.is_none() && !o.succeeded())
            .count()
    }

    /// Render the report based on output mode
    pub fn render(&self, mode: OutputMode) {
        match mode {
            OutputMode::Human => self.render_human(),
            OutputMode::Json => self.render_json(),
        }
    }

    fn render_human(&self) {
        if self.outcomes.is_empty() {
            println!("No jobs to run.");
            return;
        }

        for o in &self.outcomes {
            let short = o.id.get(..8).unwrap_or(&o.id);
            match (&o.skipped, o.exit_code) {
                (Some(reason), _) => {
                    println!("{} {short} {}", "skip".yellow(), o.command_line);
                    println!("          {}", reason.dimmed());
                },
                (None, Some(0)) => {
                    let took = o.runtime_ms.map(|ms| format_duration(std::time::Duration::from_millis(
                        u64::try_from(ms).unwrap_or(u64::MAX),
                    )));
                    println!(
                        "{}   {short} {} {}",
                        "ok".green(),
                        o.command_line,
                        took.unwrap_or_default().dimmed()
                    );
                },
                (None, code) => {
                    let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                    println!("{} {short} {} (rc {code})", "fail".red(), o.command_line);
                },
            }
        }

        let skipped = self.outcomes.len() - self.executed();
        println!(
            "\n{} executed, {} failed, {} skipped",
            self.executed(),
            self.failed(),
            skipped
        );
    }

    fn render_json(&self) {
        println!("{}", serde_json::to_string_pretty(self).unwrap_or_default());
    }
}

/// Rendered command lines of a dry run
#[derive(Debug, Serialize)]
pub struct DryRunReport {
    /// Jobs that would run
    pub jobs: Vec<DryRunJob>,
    /// Jobs that would be skipped, with reasons
    pub skipped: Vec<JobOutcome>,
    /// Include slot values and tracked files in human output
    #[serde(skip)]
    pub extended: bool,
}

/// One job of a dry run
#[derive(Debug, Serialize)]
pub struct DryRunJob {
    /// Rendered command line
    pub command_line: String,
    /// Per slot: value, rendered form and tags
    pub slots: BTreeMap<String, DryRunSlot>,
    /// Tracked input files
    pub inputs: Vec<String>,
    /// Tracked output files
    pub outputs: Vec<String>,
}

/// Value of one slot in a dry run
#[derive(Debug, Serialize)]
pub struct DryRunSlot {
    /// Expanded value
    pub value: String,
    /// Value after filters
    pub rendered: String,
    /// Atom tags
    pub tags: Vec<String>,
}

impl DryRunJob {
    /// Describe a prepared job
    #[must_use]
    pub fn from_job(job: &Job) -> Self {
        let slots = job
            .data
            .iter()
            .map(|(name, value)| {
                let slot = DryRunSlot {
                    value: value.atom.value().to_string(),
                    rendered: job.rendered.get(name).cloned().unwrap_or_default(),
                    tags: value.atom.tags().iter().cloned().collect(),
                };
                (name.clone(), slot)
            })
            .collect();
        let paths = |set: &std::collections::BTreeSet<std::path::PathBuf>| {
            set.iter().map(|p| p.display().to_string()).collect()
        };
        Self {
            command_line: job.command_line.clone(),
            slots,
            inputs: paths(&job.inputs),
            outputs: paths(&job.outputs),
        }
    }
}

impl DryRunReport {
    /// Render the report based on output mode
    pub fn render(&self, mode: OutputMode) {
        match mode {
            OutputMode::Human => self.render_human(),
            OutputMode::Json => {
                println!("{}", serde_json::to_string_pretty(self).unwrap_or_default());
            },
        }
    }

    fn render_human(&self) {
        for job in &self.jobs {
            println!("{}", job.command_line);
            if !self.extended {
                continue;
            }
            for (name, slot) in &job.slots {
                let tags = if slot.tags.is_empty() {
                    String::new()
                } else {
                    format!(" - tags {}", slot.tags.join(","))
                };
                if slot.value == slot.rendered {
                    println!("  +{name} {}{tags}", slot.value);
                } else {
                    println!("  +{name} {} -> {}{tags}", slot.value, slot.rendered);
                }
            }
            for input in &job.inputs {
                println!("  < {input}");
            }
            for output in &job.outputs {
                println!("  > {output}");
            }
        }
        for skip in &self.skipped {
            log::info!(
                "would skip '{}': {}",
                skip.command_line,
                skip.skipped.as_deref().unwrap_or_default()
            );
        }
    }
}

/// Generic operation result for simple commands
#[derive(Debug, Serialize)]
pub struct OperationResult {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable message
    pub message: String,
}

impl OperationResult {
    /// Render the result based on output mode
    pub fn render(&self, mode: OutputMode) {
        match mode {
            OutputMode::Human => println!("{}", self.message),
            OutputMode::Json => {
                println!("{}", serde_json::to_string_pretty(self).unwrap_or_default());
            },
        }
    }
}
