//! Tests for the hook registry as used by the engine

use std::sync::{Arc, Mutex};

use mus::audit::RecordKind;
use mus::engine::{Engine, RunOptions};
use mus::hooks::{Event, HookContext, HookRegistry};
use mus::job::Job;

use crate::common::{MemorySink, Workdir, context};

fn recorder(
    events: &Arc<Mutex<Vec<String>>>,
    label: &'static str,
) -> impl Fn(&mut HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static {
    let events = Arc::clone(events);
    move |_| {
        events.lock().unwrap().push(label.to_string());
        Ok(())
    }
}

#[test]
fn test_error_aborts_remaining_callbacks() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HookRegistry::new();
    registry.register(Event::JobStarted, "first", 30, recorder(&events, "first"));
    registry.register(Event::JobStarted, "broken", 20, |_| anyhow::bail!("boom"));
    registry.register(Event::JobStarted, "never", 10, recorder(&events, "never"));

    let mut job = Job::new(context().record(RecordKind::Job, None, None, None));
    let err = registry
        .invoke(Event::JobStarted, &mut HookContext::Job(&mut job))
        .unwrap_err();

    assert!(format!("{err:#}").contains("boom"));
    assert_eq!(*events.lock().unwrap(), vec!["first".to_string()]);
}

#[test]
fn test_registries_are_isolated() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut one = HookRegistry::new();
    one.register(Event::BatchStarted, "one", 10, recorder(&events, "one"));
    let two = HookRegistry::new();

    assert_eq!(one.len(Event::BatchStarted), 1);
    assert_eq!(two.len(Event::BatchStarted), 0);
}

#[tokio::test]
async fn test_engine_fires_lifecycle_events() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HookRegistry::new();
    let names = [
        (Event::TemplateCreated, "template"),
        (Event::JobPrepared, "prepared"),
        (Event::BatchStarted, "batch-start"),
        (Event::JobStarted, "start"),
        (Event::JobStopped, "stop"),
        (Event::BatchFinished, "batch-end"),
    ];
    for (event, label) in names {
        registry.register(event, label, 10, recorder(&events, label));
    }

    let engine = Engine::new(registry, Arc::new(MemorySink::default()));
    let mac = engine.create_macro("true").unwrap();
    let options = RunOptions {
        threads: 1,
        max_jobs: None,
        force: false,
    };
    engine.run(&mac, &options).await.unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["template", "batch-start", "prepared", "start", "stop", "batch-end"]
    );
}

#[tokio::test]
async fn test_record_events_bracket_every_save() {
    let dir = Workdir::new();
    dir.add_file_at("a.txt", 100);
    dir.add_file_at("a.txt.gz", 200);
    dir.add_file_at("b.txt", 100);

    let sink = Arc::new(MemorySink::default());
    let mut engine = Engine::with_default_hooks(sink.clone());
    let saving = Arc::new(Mutex::new(Vec::new()));
    let saved = Arc::new(Mutex::new(Vec::new()));
    {
        let (sink, saving) = (Arc::clone(&sink), Arc::clone(&saving));
        engine
            .hooks_mut()
            .register(Event::RecordSaving, "before", 10, move |context| {
                if let HookContext::Record(record) = context {
                    assert!(sink.records().iter().all(|r| r.uid != record.uid));
                    saving.lock().unwrap().push(record.uid.clone());
                }
                Ok(())
            });
    }
    {
        let (sink, saved) = (Arc::clone(&sink), Arc::clone(&saved));
        engine
            .hooks_mut()
            .register(Event::RecordSaved, "after", 10, move |context| {
                if let HookContext::Record(record) = context {
                    assert!(sink.records().iter().any(|r| r.uid == record.uid));
                    saved.lock().unwrap().push(record.uid.clone());
                }
                Ok(())
            });
    }

    let d = dir.path().display();
    let mac = engine
        .create_macro(&format!("true :{d}/*.txt: :>{d}/*.txt.gz:"))
        .unwrap();
    let options = RunOptions {
        threads: 1,
        max_jobs: None,
        force: false,
    };
    let report = engine.run(&mac, &options).await.unwrap();
    assert_eq!(report.executed(), 1);
    assert_eq!(report.outcomes.len(), 2);

    let uids: Vec<String> = sink.records().into_iter().map(|r| r.uid).collect();
    assert_eq!(uids.len(), 3);
    assert_eq!(uids[0], mac.record.uid);
    assert_eq!(*saving.lock().unwrap(), uids);
    assert_eq!(*saved.lock().unwrap(), uids);
}
