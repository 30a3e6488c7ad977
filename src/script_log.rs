//! Script log
//!
//! Appends every executed batch to `./mus.log` as a shell script: a comment
//! header describing the batch, then each job's command line framed by
//! comments with its start time, runtime and exit code. Running the file
//! with `sh` replays the commands.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;

use crate::audit::RecordContext;
use crate::hooks::{Event, HookContext, HookRegistry};
use crate::job::Job;
use crate::template::Template;
use crate::util::format_duration;

/// Priority of the script log subscribers; runs after most other hooks
pub const PRIORITY: i32 = 1;

/// Subscribe the script log writer to batch and job events
pub fn register(registry: &mut HookRegistry, path: PathBuf, context: RecordContext) {
    let path = Arc::new(path);

    let header_path = Arc::clone(&path);
    registry.register(Event::BatchStarted, "script-log", PRIORITY, move |hook| {
        if let HookContext::Batch { template, .. } = hook {
            append(&header_path, &header(template, &context))?;
        }
        Ok(())
    });

    registry.register(Event::JobStopped, "script-log", PRIORITY, move |hook| {
        if let HookContext::Job(job) = hook {
            append(&path, &job_block(job))?;
        }
        Ok(())
    });
}

fn append(path: &Path, text: &str) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open script log {}", path.display()))?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

fn header(template: &Template, context: &RecordContext) -> String {
    let cwd = std::env::current_dir().map(|p| p.display().to_string()).unwrap_or_default();
    format!(
        "\n\n{}\n# Time  : {}\n# Host  : {}\n# User  : {}\n# Cwd   : {cwd}\n# Macro : {}\n\n",
        "#".repeat(80),
        Local::now().format("%Y-%m-%d %H:%M"),
        context.host,
        context.user,
        template.raw().replace('\n', "\n#         "),
    )
}

fn job_block(job: &Job) -> String {
    let start = job
        .started_at
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    let runtime = job.runtime().map(format_duration).unwrap_or_default();
    let rc = job.exit_code.map_or_else(|| "-1".to_string(), |c| c.to_string());
    let mut block = format!("# Start : {start} - {}\n", job.id);
    if let Some(input) = job.inputs.iter().next() {
        block.push_str(&format!("# File  : {}\n", input.display()));
    }
    block.push_str(&format!("{}\n# Time  : {runtime}\n# RC    : {rc}\n\n", job.command_line));
    block
}
