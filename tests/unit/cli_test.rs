//! Integration tests for the mus CLI

use assert_cmd::cargo;
use predicates::prelude::*;
use tempfile::TempDir;

/// `mus` with HOME pointed at a scratch directory
fn mus(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(cargo::cargo_bin!("mus"));
    cmd.env("HOME", home.path())
        .env("MUS_HOST", "testhost")
        .env("MUS_USER", "tester")
        .current_dir(home.path());
    cmd
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    mus(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mus"));
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    mus(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Expand command templates"));
}

#[test]
fn test_no_args_shows_info() {
    let home = TempDir::new().unwrap();
    mus(&home)
        .assert()
        .success()
        .stdout(predicate::str::contains("mus v"));
}

#[test]
fn test_dry_run_prints_command_lines() {
    let home = TempDir::new().unwrap();
    mus(&home)
        .args(["run", "-d", "-f", "echo", ":a;b:", ":range(2):"])
        .assert()
        .success()
        .stdout(predicate::str::contains("echo a 0\necho a 1\necho b 0\necho b 1"));

    assert!(!home.path().join("mus.log").exists());
}

#[test]
fn test_extended_dry_run_shows_slots_and_files() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("a.txt"), "a").unwrap();
    mus(&home)
        .args(["run", "-D", "gzip -c :*.txt|resolve: > :>*.txt.gz:"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("  +a a.txt -> ")
                .and(predicate::str::contains("  < "))
                .and(predicate::str::contains("  > a.txt.gz")),
        );
}

#[test]
fn test_dry_run_respects_max_jobs() {
    let home = TempDir::new().unwrap();
    mus(&home)
        .args(["run", "-d", "-f", "-n", "1", "echo", ":a;b:"])
        .assert()
        .success()
        .stdout(predicate::str::contains("echo a").and(predicate::str::contains("echo b").not()));
}

#[test]
fn test_dry_run_leaves_out_skipped_jobs() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("a.txt"), "a").unwrap();
    mus(&home)
        .args(["run", "-d", "cat", ":a.txt;b.txt:"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cat a.txt").and(predicate::str::contains("b.txt").not()));
}

#[test]
fn test_explain() {
    let home = TempDir::new().unwrap();
    mus(&home)
        .args(["run", "-e", "gzip", ":*.txt:"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Input").and(predicate::str::contains("{{ a|")));
}

#[test]
fn test_run_writes_history_and_script_log() {
    let home = TempDir::new().unwrap();
    mus(&home)
        .args(["run", "-f", "-j", "1", "touch", ":x;y:"])
        .assert()
        .success();

    assert!(home.path().join("x").exists());
    assert!(home.path().join("y").exists());
    let log = std::fs::read_to_string(home.path().join("mus.log")).unwrap();
    assert!(log.contains("touch x"));
    let history = home.path().join(".local/mus/history.jsonl");
    let lines = std::fs::read_to_string(history).unwrap();
    assert_eq!(lines.lines().count(), 3);
}

#[test]
fn test_save_list_show_delete() {
    let home = TempDir::new().unwrap();
    mus(&home)
        .args(["run", "-e", "-s", "greet", "echo", ":hi;ho:"])
        .assert()
        .success();

    mus(&home)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("greet"));
    mus(&home)
        .args(["show", "greet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("echo :hi;ho:"));
    mus(&home)
        .args(["run", "-d", "-f", "-l", "greet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("echo hi"));
    mus(&home)
        .args(["delete", "greet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted macro 'greet'"));
    mus(&home).args(["show", "greet"]).assert().failure();
}

#[test]
fn test_bad_macro_fails() {
    let home = TempDir::new().unwrap();
    mus(&home)
        .args(["run", "echo", ":nosuch(1):"])
        .assert()
        .failure();
}
