//! Tests for the modification-time run advisory

use mus::advisory;
use mus::audit::RecordKind;
use mus::hooks::{Event, HookContext, HookRegistry};
use mus::job::{FileTag, Job};
use mus::template::Template;
use test_case::test_case;

use crate::common::{Workdir, context};

fn job() -> Job {
    Job::new(context().record(RecordKind::Job, None, None, None))
}

fn tag(job: &mut Job, tag: FileTag, path: &std::path::Path) {
    job.tag_file(tag, &path.to_string_lossy());
}

#[test_case(100, 150, false ; "output newer is vetoed")]
#[test_case(100, 100, false ; "same age is vetoed")]
#[test_case(100, 50, true ; "input newer runs")]
fn test_mtime_comparison(input_secs: u64, output_secs: u64, allowed: bool) {
    let dir = Workdir::new();
    let mut job = job();
    tag(&mut job, FileTag::Input, &dir.add_file_at("in.txt", input_secs));
    tag(&mut job, FileTag::Output, &dir.add_file_at("out.txt", output_secs));

    let vote = advisory::check(&job);
    assert_eq!(vote.allow, allowed);
    if !allowed {
        assert!(vote.reason.contains("newer"));
    }
}

#[test]
fn test_newest_input_against_oldest_output() {
    let dir = Workdir::new();
    let mut job = job();
    tag(&mut job, FileTag::Input, &dir.add_file_at("a.in", 100));
    tag(&mut job, FileTag::Input, &dir.add_file_at("b.in", 300));
    tag(&mut job, FileTag::Output, &dir.add_file_at("a.out", 200));
    tag(&mut job, FileTag::Output, &dir.add_file_at("b.out", 400));

    assert!(advisory::check(&job).allow);
}

#[test]
fn test_no_inputs_runs() {
    let dir = Workdir::new();
    let mut job = job();
    tag(&mut job, FileTag::Output, &dir.add_file_at("out.txt", 100));
    assert!(advisory::check(&job).allow);
}

#[test]
fn test_missing_input_is_vetoed() {
    let dir = Workdir::new();
    let mut job = job();
    tag(&mut job, FileTag::Input, &dir.join("gone.txt"));

    let vote = advisory::check(&job);
    assert!(!vote.allow);
    assert!(vote.reason.contains("input file does not exist"));
    assert!(vote.reason.contains("gone.txt"));
}

#[test]
fn test_missing_output_runs() {
    let dir = Workdir::new();
    let mut job = job();
    tag(&mut job, FileTag::Input, &dir.add_file_at("in.txt", 100));
    tag(&mut job, FileTag::Output, &dir.add_file_at("old.out", 150));
    tag(&mut job, FileTag::Output, &dir.join("new.out"));
    assert!(advisory::check(&job).allow);
}

#[test]
fn test_missing_extra_is_vetoed_and_extras_ignore_mtime() {
    let dir = Workdir::new();
    let mut job = job();
    tag(&mut job, FileTag::Input, &dir.add_file_at("in.txt", 100));
    tag(&mut job, FileTag::Output, &dir.add_file_at("out.txt", 50));
    tag(&mut job, FileTag::Extra, &dir.join("ref.fa"));
    assert!(!advisory::check(&job).allow);

    dir.add_file_at("ref.fa", 1_000);
    assert!(advisory::check(&job).allow);
}

#[test]
fn test_extra_slot_does_not_count_as_input() {
    let dir = Workdir::new();
    let reference = dir.add_file_at("ref.fa", 1_000);
    let input = dir.add_file_at("in.txt", 100);
    let output = dir.add_file_at("out.txt", 200);

    let raw = format!(
        "cmd :{}|extra: :x<{}: > :x>{}:",
        reference.display(),
        input.display(),
        output.display()
    );
    let template = Template::parse(&raw).unwrap();
    let binding = template.expand().unwrap().next().unwrap();
    let job = Job::from_binding(&template, &binding, job().record).unwrap();

    assert!(job.extras.contains(&reference));
    assert!(!job.inputs.contains(&reference));
    let vote = advisory::check(&job);
    assert!(!vote.allow);
    assert!(vote.reason.contains("newer"));
}

#[test]
fn test_check_is_idempotent() {
    let dir = Workdir::new();
    let mut job = job();
    tag(&mut job, FileTag::Input, &dir.add_file_at("in.txt", 100));
    tag(&mut job, FileTag::Output, &dir.add_file_at("out.txt", 150));

    assert_eq!(advisory::check(&job), advisory::check(&job));
}

#[test]
fn test_registered_check_votes_on_prepare() {
    let dir = Workdir::new();
    let mut registry = HookRegistry::new();
    advisory::register(&mut registry);

    let mut job = job();
    tag(&mut job, FileTag::Input, &dir.join("missing.txt"));
    registry
        .invoke(Event::JobPrepared, &mut HookContext::Job(&mut job))
        .unwrap();

    let (allow, reason) = job.run_advice();
    assert!(!allow);
    assert!(reason.starts_with("input file does not exist"));
}
