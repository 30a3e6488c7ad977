//! Bounded-concurrency job execution
//!
//! Jobs are pulled from a lazy sequence in order and launched as shell
//! processes. A semaphore admits at most `threads` jobs at a time; a
//! permit is only returned after the job's stop hooks have run, so the
//! number of jobs started but not stopped never exceeds `threads`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{Id, JoinSet};

use crate::job::Job;

/// Callbacks bracketing each job's process
pub trait Lifecycle {
    /// Called right before the process is launched
    fn started(&mut self, job: &mut Job) -> anyhow::Result<()>;

    /// Called once the process has exited
    fn stopped(&mut self, job: Job) -> anyhow::Result<()>;
}

/// Runs jobs with a concurrency cap and an optional job-count cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    threads: usize,
    max_jobs: Option<usize>,
}

impl Executor {
    /// Create an executor running at most `threads` jobs at once
    #[must_use]
    pub fn new(threads: usize, max_jobs: Option<usize>) -> Self {
        Self {
            threads: threads.max(1),
            max_jobs,
        }
    }

    /// Concurrency cap
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Run `jobs` until the sequence ends or the job-count cap is reached
    ///
    /// Non-zero exits are recorded on the job and never stop the batch. An
    /// error from the job sequence or a lifecycle callback stops admission;
    /// jobs already running are waited for before it is returned.
    ///
    /// Returns the number of jobs started.
    pub async fn execute<I, L>(&self, jobs: I, lifecycle: &mut L) -> anyhow::Result<usize>
    where
        I: IntoIterator<Item = anyhow::Result<Job>>,
        L: Lifecycle + ?Sized,
    {
        let gate = Arc::new(Semaphore::new(self.threads));
        let mut running: JoinSet<Job> = JoinSet::new();
        let mut permits: HashMap<Id, OwnedSemaphorePermit> = HashMap::new();
        let mut jobs = jobs.into_iter();
        let mut started = 0usize;
        let mut exhausted = false;
        let mut failure: Option<anyhow::Error> = None;

        loop {
            let admitting = !exhausted
                && failure.is_none()
                && self.max_jobs.is_none_or(|max| started < max);

            tokio::select! {
                biased;

                Some(done) = running.join_next_with_id() => {
                    let outcome = done
                        .context("job task failed")
                        .and_then(|(id, job)| {
                            let result = lifecycle.stopped(job);
                            permits.remove(&id);
                            result
                        });
                    if let Err(e) = outcome {
                        failure.get_or_insert(e);
                    }
                },

                permit = Arc::clone(&gate).acquire_owned(), if admitting => {
                    let permit = permit.context("admission gate closed")?;
                    match jobs.next() {
                        None => exhausted = true,
                        Some(Err(e)) => {
                            failure = Some(e);
                        },
                        Some(Ok(mut job)) => {
                            job.start();
                            match lifecycle.started(&mut job) {
                                Ok(()) => {
                                    started += 1;
                                    let handle = running.spawn(run(job));
                                    permits.insert(handle.id(), permit);
                                },
                                Err(e) => failure = Some(e),
                            }
                        },
                    }
                },

                else => break,
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(started),
        }
    }
}

async fn run(mut job: Job) -> Job {
    log::info!("Executing {}: {}", job.id, job.command_line);
    let code = match shell(&job.command_line).status().await {
        Ok(status) => status.code(),
        Err(e) => {
            log::error!("cannot launch '{}': {e}", job.command_line);
            None
        },
    };
    job.stop(code);
    log::debug!("Finished {} with {code:?}", job.id);
    job
}

#[cfg(not(windows))]
fn shell(command_line: &str) -> tokio::process::Command {
    let mut command = tokio::process::Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}

#[cfg(windows)]
fn shell(command_line: &str) -> tokio::process::Command {
    let mut command = tokio::process::Command::new("cmd");
    command.arg("/C").arg(command_line);
    command
}
