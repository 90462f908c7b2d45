//! CLI tests for the `gitevent` binary.
//!
//! Spawns the binary against a throwaway repository and checks exit codes,
//! stdout and the state files it leaves behind.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use gitevent::exit_codes;
use gitevent::io::init::StatePaths;
use gitevent::test_support::TestRepo;

fn gitevent(repo: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gitevent"))
        .arg("--repo")
        .arg(repo)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("spawn gitevent")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn run_without_steps_exits_with_nothing_selected() {
    let repo = TestRepo::new().expect("repo");
    let output = gitevent(repo.path(), &["run", "--offline"]);
    assert_eq!(output.status.code(), Some(exit_codes::NOTHING_SELECTED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no operation selected"));
}

#[test]
fn save_without_a_run_is_invalid() {
    let repo = TestRepo::new().expect("repo");
    let output = gitevent(repo.path(), &["save", "--title", "nothing ran"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

/// init -> run -> save -> history, with the draft carried in run_state.json.
#[test]
fn run_save_and_history_round_trip() {
    let repo = TestRepo::new().expect("repo");
    repo.branch_with_commit("feature-a", "a.txt", "a\n").expect("branch");
    let git_dir = repo.path().join(".git");
    let paths = StatePaths::new(&git_dir);

    let init = gitevent(repo.path(), &["init"]);
    assert_eq!(init.status.code(), Some(exit_codes::OK));
    assert!(paths.config_path.exists());

    let run = gitevent(
        repo.path(),
        &[
            "--offline",
            "run",
            "--create-branch",
            "--branch-name",
            "integration",
            "--merge",
            "--merge-branch",
            "feature-a",
            "--on-failure",
            "stop",
        ],
    );
    assert_eq!(run.status.code(), Some(exit_codes::OK), "{}", stdout(&run));
    assert!(stdout(&run).contains("create branch: created integration"));
    assert!(stdout(&run).contains("  feature-a @ "));
    assert!(paths.run_state_path.exists());
    assert_eq!(
        repo.git(&["rev-parse", "--abbrev-ref", "HEAD"]).expect("head"),
        "integration"
    );

    let save = gitevent(
        repo.path(),
        &["save", "--title", "Integrate A", "--notes", "first pass"],
    );
    assert_eq!(save.status.code(), Some(exit_codes::OK));
    assert!(!paths.run_state_path.exists());

    let history = gitevent(repo.path(), &["history", "--base-branch", "main"]);
    assert_eq!(history.status.code(), Some(exit_codes::OK));
    let listing = stdout(&history);
    assert!(listing.contains("Integrate A  [base: main] branch: integration merged: 1"));

    let details = gitevent(repo.path(), &["history", "--details"]);
    assert!(stdout(&details).contains("Notes: first pass"));
}

#[test]
fn history_on_empty_store_reports_no_events() {
    let repo = TestRepo::new().expect("repo");
    let output = gitevent(repo.path(), &["history"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output).trim(), "no events");
}

#[test]
fn name_resolves_against_existing_branches() {
    let repo = TestRepo::new().expect("repo");
    repo.git(&["branch", "feature_2024.01.01"]).expect("branch");
    repo.git(&["branch", "feature_2024.01.01.3"]).expect("branch");

    let output = gitevent(
        repo.path(),
        &["--offline", "name", "branch", "--date", "2024.01.01"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output).trim(), "feature_2024.01.01.4");
}
