//! Tests for bounded-concurrency execution

use std::time::{Duration, Instant};

use mus::audit::RecordKind;
use mus::executor::{Executor, Lifecycle};
use mus::job::Job;

use crate::common::{Workdir, context};

#[derive(Default)]
struct Counter {
    active: usize,
    max_active: usize,
    stopped: Vec<Job>,
}

impl Lifecycle for Counter {
    fn started(&mut self, _job: &mut Job) -> anyhow::Result<()> {
        self.active += 1;
        self.max_active = self.max_active.max(self.active);
        Ok(())
    }

    fn stopped(&mut self, job: Job) -> anyhow::Result<()> {
        self.active -= 1;
        self.stopped.push(job);
        Ok(())
    }
}

fn job(command_line: &str) -> anyhow::Result<Job> {
    let mut job = Job::new(context().record(RecordKind::Job, None, None, None));
    job.command_line = command_line.to_string();
    Ok(job)
}

#[tokio::test]
async fn test_concurrency_cap() {
    let jobs: Vec<_> = (0..5).map(|_| job("sleep 0.3")).collect();
    let mut counter = Counter::default();

    let begin = Instant::now();
    let started = Executor::new(2, None).execute(jobs, &mut counter).await.unwrap();
    let elapsed = begin.elapsed();

    assert_eq!(started, 5);
    assert_eq!(counter.stopped.len(), 5);
    assert!(counter.max_active <= 2);
    assert!(elapsed >= Duration::from_millis(900), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "took {elapsed:?}");
}

#[tokio::test]
async fn test_max_jobs_stops_admission() {
    let dir = Workdir::new();
    let jobs: Vec<_> = (0..4)
        .map(|i| job(&format!("touch {}", dir.join(&format!("f{i}")).display())))
        .collect();
    let mut counter = Counter::default();

    let started = Executor::new(4, Some(2)).execute(jobs, &mut counter).await.unwrap();

    assert_eq!(started, 2);
    assert!(dir.join("f0").exists());
    assert!(dir.join("f1").exists());
    assert!(!dir.join("f2").exists());
}

#[tokio::test]
async fn test_failures_do_not_stop_the_batch() {
    let jobs = vec![job("exit 3"), job("true"), job("kill -9 $$")];
    let mut counter = Counter::default();

    Executor::new(1, None).execute(jobs, &mut counter).await.unwrap();

    let codes: Vec<Option<i32>> = counter.stopped.iter().map(|j| j.exit_code).collect();
    assert_eq!(codes, vec![Some(3), Some(0), None]);
    assert!(counter.stopped.iter().all(|j| j.runtime().is_some()));
}

#[tokio::test]
async fn test_sequence_error_waits_for_running_jobs() {
    let dir = Workdir::new();
    let marker = dir.join("done");
    let jobs = vec![
        job(&format!("sleep 0.2 && touch {}", marker.display())),
        Err(anyhow::anyhow!("render failed")),
        job("true"),
    ];
    let mut counter = Counter::default();

    let err = Executor::new(2, None).execute(jobs, &mut counter).await.unwrap_err();

    assert!(err.to_string().contains("render failed"));
    assert!(marker.exists());
    assert_eq!(counter.stopped.len(), 1);
}
