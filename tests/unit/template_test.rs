//! Tests for template expansion and rendering over real files

use std::collections::BTreeSet;
use std::path::PathBuf;

use mus::job::Job;
use mus::template::Template;
use proptest::prelude::*;
use serial_test::serial;

use crate::common::{Workdir, context};

fn command_lines(raw: &str) -> Vec<String> {
    let template = Template::parse(raw).unwrap();
    template
        .expand()
        .unwrap()
        .map(|b| template.render_plain(&b).unwrap())
        .collect()
}

/// Changes into a directory for the lifetime of the guard
struct InDir {
    previous: PathBuf,
}

impl InDir {
    fn new(dir: &std::path::Path) -> Self {
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self { previous }
    }
}

impl Drop for InDir {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.previous);
    }
}

#[test]
fn test_singleton_is_raw_text() {
    let raw = "echo done && date";
    assert_eq!(command_lines(raw), vec![raw.to_string()]);
}

#[test]
fn test_product_is_lexicographic_in_slot_order() {
    assert_eq!(
        command_lines("run :a;b: :range(2): :x;y:"),
        vec![
            "run a 0 x",
            "run a 0 y",
            "run a 1 x",
            "run a 1 y",
            "run b 0 x",
            "run b 0 y",
            "run b 1 x",
            "run b 1 y",
        ]
    );
}

#[test]
fn test_glob_yields_matching_files() {
    let dir = Workdir::new();
    dir.add_file("a.txt", "a");
    dir.add_file("b.txt", "b");
    dir.add_file("c.md", "c");

    let pattern = format!("cat :{}/*.txt:", dir.path().display());
    let found: BTreeSet<String> = command_lines(&pattern).into_iter().collect();
    let expected: BTreeSet<String> = ["a.txt", "b.txt"]
        .iter()
        .map(|f| format!("cat {}", dir.join(f).display()))
        .collect();
    assert_eq!(found, expected);
}

#[test]
#[serial]
fn test_relative_glob_with_implied_output() {
    let dir = Workdir::new();
    dir.add_file("seq.fa", ">s\nACGT\n");
    let _cwd = InDir::new(dir.path());

    let template = Template::parse("gzip -c :*.fa: > :>*.fa.gz:").unwrap();
    let binding = template.expand().unwrap().next().unwrap();
    let record = context().record(mus::audit::RecordKind::Job, None, None, None);
    let job = Job::from_binding(&template, &binding, record).unwrap();

    assert_eq!(job.command_line, "gzip -c seq.fa > seq.fa.gz");
    assert!(job.inputs.contains(&PathBuf::from("seq.fa")));
    assert!(job.outputs.contains(&PathBuf::from("seq.fa.gz")));
}

#[test]
#[serial]
fn test_globmap_from_provenance() {
    let dir = Workdir::new();
    dir.add_file("reads.1.fq", "");
    let _cwd = InDir::new(dir.path());

    assert_eq!(
        command_lines("echo :*.?.fq|globmap('*.no?.txt'):"),
        vec!["echo reads.no1.txt"]
    );
}

#[test]
fn test_read_and_remove_pipeline() {
    let dir = Workdir::new();
    let list = dir.add_file("samples.txt", "s1 s2\ncontrol s3\n");

    let raw = format!("echo :{}&read;control&remove:", list.display());
    assert_eq!(command_lines(&raw), vec!["echo s1", "echo s2", "echo s3"]);
}

#[test]
fn test_extra_files_are_tracked() {
    let template = Template::parse("bwa mem :ref.fa|extra: :x<r1.fq:").unwrap();
    let binding = template.expand().unwrap().next().unwrap();
    let record = context().record(mus::audit::RecordKind::Job, None, None, None);
    let job = Job::from_binding(&template, &binding, record).unwrap();

    assert!(job.extras.contains(&PathBuf::from("ref.fa")));
    assert!(!job.inputs.contains(&PathBuf::from("ref.fa")));
    assert!(job.inputs.contains(&PathBuf::from("r1.fq")));
}

#[test]
fn test_explicit_output_tag_on_input_slot() {
    let template = Template::parse("touch :x<done.flag|output:").unwrap();
    let binding = template.expand().unwrap().next().unwrap();
    let record = context().record(mus::audit::RecordKind::Job, None, None, None);
    let job = Job::from_binding(&template, &binding, record).unwrap();

    assert!(job.inputs.is_empty());
    assert!(job.outputs.contains(&PathBuf::from("done.flag")));
}

proptest! {
    /// k independent slots with n1..nk values give n1*...*nk bindings
    #[test]
    fn product_cardinality(sizes in proptest::collection::vec(0usize..5, 0..4)) {
        let raw: String = sizes.iter().map(|n| format!(":range({n}): ")).collect();
        let template = Template::parse(&raw).unwrap();
        let expected: usize = sizes.iter().product();
        prop_assert_eq!(template.expand().unwrap().count(), expected);
    }
}
