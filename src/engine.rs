//! Engine
//!
//! Ties the pieces together: parses a template, turns its bindings into
//! prepared jobs, and runs the jobs that survive the advisory vote.

use std::cell::RefCell;
use std::sync::Arc;

use anyhow::{Context, anyhow};

use crate::advisory;
use crate::audit::{AuditSink, Record, RecordKind};
use crate::executor::{Executor, Lifecycle};
use crate::hooks::{Event, HookContext, HookRegistry};
use crate::job::Job;
use crate::output::{BatchReport, JobOutcome};
use crate::template::{Binding, Bindings, Template};

/// A parsed template with its saved audit record
#[derive(Debug, Clone)]
pub struct Macro {
    /// Parsed template
    pub template: Template,
    /// Audit record of the template, parent of every job record
    pub record: Record,
}

/// A job after the advisory vote
#[derive(Debug)]
pub enum Prepared {
    /// The job should run
    Run(Job),
    /// The job was vetoed
    Skipped {
        /// The vetoed job
        job: Job,
        /// Comma separated veto reasons
        reason: String,
    },
}

/// Options for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of concurrent processes
    pub threads: usize,
    /// Stop after starting this many jobs
    pub max_jobs: Option<usize>,
    /// Run vetoed jobs anyway
    pub force: bool,
}

/// Template engine with its hook registry and audit sink
#[derive(Debug)]
pub struct Engine {
    hooks: HookRegistry,
    sink: Arc<dyn AuditSink>,
}

impl Engine {
    /// Create an engine from an already populated registry
    #[must_use]
    pub fn new(hooks: HookRegistry, sink: Arc<dyn AuditSink>) -> Self {
        Self { hooks, sink }
    }

    /// Create an engine with the built-in advisory check registered
    #[must_use]
    pub fn with_default_hooks(sink: Arc<dyn AuditSink>) -> Self {
        let mut hooks = HookRegistry::new();
        advisory::register(&mut hooks);
        Self::new(hooks, sink)
    }

    /// Hook registry
    #[must_use]
    pub const fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Hook registry, for registering more subscribers
    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Audit sink
    #[must_use]
    pub fn sink(&self) -> &dyn AuditSink {
        self.sink.as_ref()
    }

    /// Replace `!<hex>` with the command of the matching history record
    pub fn resolve_raw(&self, raw: &str) -> anyhow::Result<String> {
        let trimmed = raw.trim();
        let Some(prefix) = trimmed.strip_prefix('!') else {
            return Ok(raw.to_string());
        };
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Ok(raw.to_string());
        }
        let record = self
            .sink
            .find_by_prefix(prefix)?
            .ok_or_else(|| anyhow!("no history record with id starting with '{prefix}'"))?;
        let recalled = record
            .cl
            .or(record.message)
            .ok_or_else(|| anyhow!("history record {} has no command", record.uid))?;
        log::info!("recalled {}: {recalled}", record.uid);
        Ok(recalled)
    }

    /// Hand a record to the sink, bracketed by the record hooks
    pub fn persist(&self, record: &mut Record) -> anyhow::Result<()> {
        self.hooks.invoke(Event::RecordSaving, &mut HookContext::Record(record))?;
        self.sink.save(record).context("cannot save audit record")?;
        self.hooks.invoke(Event::RecordSaved, &mut HookContext::Record(record))
    }

    /// Parse raw text (or recall it from history) and save its record
    pub fn create_macro(&self, raw: &str) -> anyhow::Result<Macro> {
        let raw = self.resolve_raw(raw)?;
        let template = Template::parse(&raw).context("invalid macro")?;
        log::debug!("template: {template}");

        let mut record = self.sink.prepare(RecordKind::Macro, Some(&raw), None, None);
        record.cl = Some(raw.clone());
        self.persist(&mut record)?;
        self.hooks
            .invoke(Event::TemplateCreated, &mut HookContext::Template(&template))?;
        Ok(Macro { template, record })
    }

    /// Expand the template lazily into prepared jobs
    ///
    /// Nothing is saved here; callers decide what to persist.
    pub fn prepare_jobs<'a>(&'a self, mac: &'a Macro, force: bool) -> anyhow::Result<PreparedJobs<'a>> {
        let bindings = mac.template.expand().context("cannot expand macro")?;
        if mac.template.is_singleton() {
            log::info!("Executing singleton command");
        }
        Ok(PreparedJobs {
            engine: self,
            mac,
            bindings,
            force,
        })
    }

    fn prepare_job(&self, mac: &Macro, binding: &Binding, force: bool) -> anyhow::Result<Prepared> {
        let syntax = mac.template.render_syntax();
        let record = self
            .sink
            .prepare(RecordKind::Job, Some(&syntax), None, Some(&mac.record.uid));
        let mut job = Job::from_binding(&mac.template, binding, record)
            .with_context(|| format!("cannot render '{}'", mac.template.raw()))?;

        self.hooks.invoke(Event::JobPrepared, &mut HookContext::Job(&mut job))?;

        let (allow, reason) = job.run_advice();
        if allow {
            self.sink.add_message(&mut job.record, "Run because no advisory vetoed it");
            Ok(Prepared::Run(job))
        } else if force {
            self.sink
                .add_message(&mut job.record, &format!("Run forced despite '{reason}'"));
            Ok(Prepared::Run(job))
        } else {
            log::warn!("skipping job '{}' because: '{reason}'", job.command_line);
            self.sink
                .add_message(&mut job.record, &format!("Skipped because '{reason}'"));
            Ok(Prepared::Skipped { job, reason })
        }
    }

    /// Run every job of `mac` that survives the advisory vote
    ///
    /// Skipped jobs are saved with their veto reasons; executed jobs are
    /// saved as they finish.
    pub async fn run(&self, mac: &Macro, options: &RunOptions) -> anyhow::Result<BatchReport> {
        let report = RefCell::new(BatchReport {
            template: mac.template.raw().to_string(),
            outcomes: Vec::new(),
        });
        self.hooks.invoke(
            Event::BatchStarted,
            &mut HookContext::Batch {
                template: &mac.template,
                report: &report.borrow(),
            },
        )?;

        let jobs = self.prepare_jobs(mac, options.force)?.filter_map(|prepared| match prepared {
            Ok(Prepared::Run(job)) => Some(Ok(job)),
            Ok(Prepared::Skipped { mut job, reason }) => {
                job.record.status = -1;
                match self.persist(&mut job.record) {
                    Ok(()) => {
                        report.borrow_mut().outcomes.push(JobOutcome::skipped(&job, &reason));
                        None
                    },
                    Err(e) => Some(Err(e)),
                }
            },
            Err(e) => Some(Err(e)),
        });

        let mut tracker = Tracker {
            engine: self,
            report: &report,
        };
        let started = Executor::new(options.threads, options.max_jobs)
            .execute(jobs, &mut tracker)
            .await?;
        log::debug!("batch finished, {started} job(s) started");

        let report = report.into_inner();
        self.hooks.invoke(
            Event::BatchFinished,
            &mut HookContext::Batch {
                template: &mac.template,
                report: &report,
            },
        )?;
        Ok(report)
    }
}

/// Lazy stream of prepared jobs, in binding order
#[derive(Debug)]
pub struct PreparedJobs<'a> {
    engine: &'a Engine,
    mac: &'a Macro,
    bindings: Bindings,
    force: bool,
}

impl Iterator for PreparedJobs<'_> {
    type Item = anyhow::Result<Prepared>;

    fn next(&mut self) -> Option<Self::Item> {
        let binding = self.bindings.next()?;
        Some(self.engine.prepare_job(self.mac, &binding, self.force))
    }
}

struct Tracker<'a> {
    engine: &'a Engine,
    report: &'a RefCell<BatchReport>,
}

impl Lifecycle for Tracker<'_> {
    fn started(&mut self, job: &mut Job) -> anyhow::Result<()> {
        self.engine.hooks.invoke(Event::JobStarted, &mut HookContext::Job(job))
    }

    fn stopped(&mut self, mut job: Job) -> anyhow::Result<()> {
        self.engine
            .hooks
            .invoke(Event::JobStopped, &mut HookContext::Job(&mut job))?;
        job.finalize_record();
        self.engine.persist(&mut job.record)?;
        self.report.borrow_mut().outcomes.push(JobOutcome::finished(&job));
        Ok(())
    }
}
