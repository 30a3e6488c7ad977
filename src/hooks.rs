//! Hook registry
//!
//! Callbacks subscribe to lifecycle [`Event`]s with a priority. The registry
//! is owned by the [`crate::engine::Engine`] and passed in at construction,
//! so tests build their own instead of sharing one.

use std::collections::HashMap;
use std::fmt;

use crate::audit::Record;
use crate::job::Job;
use crate::output::BatchReport;
use crate::template::Template;

/// Priority used when a subscriber has no preference
pub const DEFAULT_PRIORITY: i32 = 10;

/// Lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A template was parsed and its record saved
    TemplateCreated,
    /// A job was rendered; advisory checks vote here
    JobPrepared,
    /// A job's process is about to be launched
    JobStarted,
    /// A job's process has exited
    JobStopped,
    /// A batch of jobs is about to run
    BatchStarted,
    /// Every job of a batch has finished
    BatchFinished,
    /// A record is about to be handed to the audit sink
    RecordSaving,
    /// A record was handed to the audit sink
    RecordSaved,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TemplateCreated => "template-created",
            Self::JobPrepared => "job-prepared",
            Self::JobStarted => "job-started",
            Self::JobStopped => "job-stopped",
            Self::BatchStarted => "batch-started",
            Self::BatchFinished => "batch-finished",
            Self::RecordSaving => "record-saving",
            Self::RecordSaved => "record-saved",
        };
        f.write_str(name)
    }
}

/// Context handed to every callback of one invocation
#[derive(Debug)]
pub enum HookContext<'a> {
    /// Template events
    Template(&'a Template),
    /// Job events
    Job(&'a mut Job),
    /// Batch events
    Batch {
        /// Template the batch was expanded from
        template: &'a Template,
        /// Results so far; empty on [`Event::BatchStarted`]
        report: &'a BatchReport,
    },
    /// Record events
    Record(&'a mut Record),
}

/// A subscriber callback; an error aborts the invocation
pub type Hook = Box<dyn Fn(&mut HookContext<'_>) -> anyhow::Result<()> + Send + Sync>;

struct Entry {
    priority: i32,
    name: String,
    hook: Hook,
}

/// Priority ordered publish/subscribe registry
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<Event, Vec<Entry>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (event, entries) in &self.hooks {
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            map.entry(event, &names);
        }
        map.finish()
    }
}

impl HookRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `hook` to `event`
    ///
    /// Higher priorities run first; equal priorities run in registration order.
    pub fn register<F>(&mut self, event: Event, name: &str, priority: i32, hook: F)
    where
        F: Fn(&mut HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let entries = self.hooks.entry(event).or_default();
        let at = entries.iter().position(|e| e.priority < priority).unwrap_or(entries.len());
        entries.insert(
            at,
            Entry {
                priority,
                name: name.to_string(),
                hook: Box::new(hook),
            },
        );
    }

    /// Number of subscribers for `event`
    #[must_use]
    pub fn len(&self, event: Event) -> usize {
        self.hooks.get(&event).map_or(0, Vec::len)
    }

    /// True when nothing is subscribed to any event
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }

    /// Call every subscriber of `event` with the same context
    ///
    /// Stops at the first error and returns it.
    pub fn invoke(&self, event: Event, context: &mut HookContext<'_>) -> anyhow::Result<()> {
        let Some(entries) = self.hooks.get(&event) else {
            return Ok(());
        };
        for entry in entries {
            log::debug!("hook {event}: {} (priority {})", entry.name, entry.priority);
            (entry.hook)(context)
                .map_err(|e| e.context(format!("hook '{}' failed on {event}", entry.name)))?;
        }
        Ok(())
    }
}
