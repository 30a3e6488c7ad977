//! Tests for the engine: advisory skips, forcing, history recall and records

use std::sync::Arc;

use mus::audit::RecordKind;
use mus::engine::{Engine, Prepared, RunOptions};

use crate::common::{MemorySink, Workdir};

fn engine() -> (Engine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    (Engine::with_default_hooks(sink.clone()), sink)
}

const fn options(force: bool) -> RunOptions {
    RunOptions {
        threads: 1,
        max_jobs: None,
        force,
    }
}

/// `a.txt` is older than its `.gz`, `b.txt` has none
fn half_done() -> (Workdir, String) {
    let dir = Workdir::new();
    dir.add_file_at("a.txt", 100);
    dir.add_file_at("a.txt.gz", 200);
    dir.add_file_at("b.txt", 100);
    let d = dir.path().display();
    let raw = format!("true :{d}/*.txt: :>{d}/*.txt.gz:");
    (dir, raw)
}

#[tokio::test]
async fn test_up_to_date_job_is_skipped_and_saved() {
    let (dir, raw) = half_done();
    let (engine, sink) = engine();

    let mac = engine.create_macro(&raw).unwrap();
    let report = engine.run(&mac, &options(false)).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.executed(), 1);
    let skipped: Vec<_> = report.outcomes.iter().filter(|o| o.skipped.is_some()).collect();
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].command_line.contains(&dir.join("a.txt").display().to_string()));
    assert_eq!(
        skipped[0].skipped.as_deref(),
        Some("output files newer than input files")
    );

    let jobs = sink.of_kind(RecordKind::Job);
    assert_eq!(jobs.len(), 2);
    let skip_record = jobs.iter().find(|r| r.status == -1).unwrap();
    assert!(
        skip_record
            .message
            .as_deref()
            .unwrap()
            .contains("Skipped because 'output files newer than input files'")
    );
}

#[tokio::test]
async fn test_force_runs_vetoed_jobs() {
    let (_dir, raw) = half_done();
    let (engine, sink) = engine();

    let mac = engine.create_macro(&raw).unwrap();
    let report = engine.run(&mac, &options(true)).await.unwrap();

    assert_eq!(report.executed(), 2);
    assert_eq!(report.failed(), 0);
    let forced = sink
        .of_kind(RecordKind::Job)
        .into_iter()
        .filter(|r| r.message.as_deref().is_some_and(|m| m.contains("Run forced despite")))
        .count();
    assert_eq!(forced, 1);
}

#[test]
fn test_prepare_jobs_does_not_save() {
    let (_dir, raw) = half_done();
    let (engine, sink) = engine();

    let mac = engine.create_macro(&raw).unwrap();
    let prepared: Vec<_> = engine
        .prepare_jobs(&mac, false)
        .unwrap()
        .collect::<anyhow::Result<_>>()
        .unwrap();

    assert_eq!(prepared.len(), 2);
    assert!(matches!(prepared[0], Prepared::Skipped { .. }));
    assert!(matches!(prepared[1], Prepared::Run(_)));
    assert!(sink.of_kind(RecordKind::Job).is_empty());
    assert_eq!(sink.of_kind(RecordKind::Macro).len(), 1);
}

#[tokio::test]
async fn test_job_records_point_at_macro() {
    let (engine, sink) = engine();

    let mac = engine.create_macro("exit :0;3:").unwrap();
    let report = engine.run(&mac, &options(true)).await.unwrap();

    assert_eq!(report.failed(), 1);
    let jobs = sink.of_kind(RecordKind::Job);
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|r| r.child_of.as_deref() == Some(mac.record.uid.as_str())));
    let mut statuses: Vec<i32> = jobs.iter().map(|r| r.status).collect();
    statuses.sort_unstable();
    assert_eq!(statuses, vec![0, 3]);
    assert!(jobs.iter().all(|r| r.data.contains_key("runtime")));
}

#[tokio::test]
async fn test_missing_inputs_are_skipped() {
    let (engine, sink) = engine();

    let mac = engine.create_macro("exit :0;3:").unwrap();
    let report = engine.run(&mac, &options(false)).await.unwrap();

    assert_eq!(report.executed(), 0);
    assert!(report.outcomes.iter().all(|o| {
        o.skipped
            .as_deref()
            .is_some_and(|r| r.starts_with("input file does not exist"))
    }));
    assert!(sink.of_kind(RecordKind::Job).iter().all(|r| r.status == -1));
}

#[test]
fn test_recall_from_history() {
    let (engine, _sink) = engine();

    let first = engine.create_macro("echo :a;b:").unwrap();
    let recalled = engine
        .create_macro(&format!("!{}", &first.record.uid[..8]))
        .unwrap();

    assert_eq!(recalled.template.raw(), "echo :a;b:");
    assert_ne!(recalled.record.uid, first.record.uid);
}

#[test]
fn test_recall_unknown_prefix() {
    let (engine, _sink) = engine();
    let err = engine.create_macro("!abcdef").unwrap_err();
    assert!(err.to_string().contains("abcdef"));
}

#[test]
fn test_parse_error_saves_nothing() {
    let (engine, sink) = engine();
    assert!(engine.create_macro("echo :nosuch(1):").is_err());
    assert!(sink.records().is_empty());
}
