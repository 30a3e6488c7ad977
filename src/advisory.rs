//! Run advisory check
//!
//! Decides from file modification times whether a job's outputs are already
//! up to date. The check only reads the filesystem, so calling it twice on
//! the same job gives the same vote.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::hooks::{DEFAULT_PRIORITY, Event, HookContext, HookRegistry};
use crate::job::{AdvisoryVote, Job};

/// Vote on whether `job` needs to run
#[must_use]
pub fn check(job: &Job) -> AdvisoryVote {
    let missing_extras = missing(&job.extras);
    if !missing_extras.is_empty() {
        return AdvisoryVote::veto(format!("extra file does not exist: {}", missing_extras.join(", ")));
    }

    if job.inputs.is_empty() {
        return AdvisoryVote::allow("no input files tracked");
    }

    let missing_inputs = missing(&job.inputs);
    if !missing_inputs.is_empty() {
        return AdvisoryVote::veto(format!("input file does not exist: {}", missing_inputs.join(", ")));
    }

    if job.outputs.is_empty() {
        return AdvisoryVote::allow("no output files tracked");
    }
    if job.outputs.iter().any(|p| !p.exists()) {
        return AdvisoryVote::allow("output file missing");
    }

    let newest_input = job.inputs.iter().filter_map(|p| mtime(p)).max();
    let oldest_output = job.outputs.iter().filter_map(|p| mtime(p)).min();
    match (newest_input, oldest_output) {
        (Some(input), Some(output)) if input <= output => {
            AdvisoryVote::veto("output files newer than input files")
        },
        _ => AdvisoryVote::allow("input files newer than output files"),
    }
}

/// Subscribe the check to [`Event::JobPrepared`]
pub fn register(registry: &mut HookRegistry) {
    registry.register(Event::JobPrepared, "mtime-check", DEFAULT_PRIORITY, |context| {
        if let HookContext::Job(job) = context {
            let vote = check(job);
            job.add_vote(vote);
        }
        Ok(())
    });
}

fn missing<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect()
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
