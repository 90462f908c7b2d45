//! End-to-end workflow tests against a real git repository.
//!
//! Each test builds a throwaway working clone with a bare `origin`, drives the
//! library through `Git`, and checks both the repository and the event store.

use chrono::DateTime;

use gitevent::core::names::NameSpec;
use gitevent::core::types::{EventDetails, RefKind, StepToggles};
use gitevent::io::event_store::EventStore;
use gitevent::io::git::{Git, VersionControl};
use gitevent::merge::{FixedPolicy, MergeDecision, MergeSelection};
use gitevent::refs::{RefCache, RefreshMode};
use gitevent::test_support::TestRepo;
use gitevent::workflow::{RunRequest, StepOutcome, Workflow};

fn now() -> chrono::DateTime<chrono::FixedOffset> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00+00:00").expect("ts")
}

/// Branch from main, merge two branches and a tag, tag the result, save.
///
/// Asserts:
/// - the new branch name skips the existing preset name
/// - provenance is recorded in selection order (branches, then tags)
/// - the tag reaches origin
/// - the saved event is reachable by date and by base branch
#[test]
fn full_run_creates_merges_tags_and_saves() {
    let repo = TestRepo::new().expect("repo");
    repo.branch_with_commit("feature-a", "a.txt", "a\n").expect("a");
    repo.branch_with_commit("feature-b", "b.txt", "b\n").expect("b");
    repo.branch_with_commit("hotfix", "h.txt", "h\n").expect("hotfix");
    repo.git(&["tag", "hotfix-1", "hotfix"]).expect("tag");
    repo.git(&["branch", "release_2024.06.01", "main"]).expect("branch");

    let mut workflow = Workflow::new(
        Git::new(repo.path()),
        RefCache::new("origin", RefreshMode::Fetch),
    );
    let request = RunRequest {
        toggles: StepToggles {
            create_branch: true,
            merge: true,
            create_tag: true,
        },
        branch: Some(NameSpec::preset(RefKind::Branch, "release", "2024.06.01")),
        base_ref: Some("main".to_string()),
        selection: MergeSelection {
            branches: vec!["feature-b".to_string(), "feature-a".to_string()],
            tags: vec!["hotfix-1".to_string()],
        },
        tag: Some(NameSpec::preset(RefKind::Tag, "v", "2024.06.01")),
    };

    let report = workflow
        .execute(&request, &FixedPolicy(MergeDecision::Stop), now())
        .expect("execute");
    assert!(!report.is_partial(), "{report:?}");

    let git = workflow.vcs();
    assert_eq!(git.current_branch().expect("branch"), "release_2024.06.01.1");
    let merged: Vec<_> = report
        .draft
        .merged_items
        .iter()
        .map(|item| (item.ref_display_name.as_str(), item.kind))
        .collect();
    assert_eq!(
        merged,
        vec![
            ("feature-b", RefKind::Branch),
            ("feature-a", RefKind::Branch),
            ("hotfix-1", RefKind::Tag),
        ]
    );
    let tip = git.commit_info("feature-a").expect("commit");
    assert_eq!(report.draft.merged_items[1].short_commit_id, tip.short_id());
    assert!(repo.path().join("a.txt").exists());
    assert!(repo.path().join("h.txt").exists());
    assert_eq!(
        repo.origin_refs("refs/tags").expect("origin tags"),
        vec!["refs/tags/v_2024.06.01"]
    );

    let temp = tempfile::tempdir().expect("tempdir");
    let store = EventStore::new(temp.path());
    let details = EventDetails {
        title: "June release".to_string(),
        description: "monthly".to_string(),
        notes: String::new(),
    };
    workflow.save_event(&store, &details, now()).expect("save");
    assert!(workflow.draft().is_none());

    let loaded = store.load_all().expect("load");
    assert!(loaded.errors.is_empty());
    let by_branch = loaded.indexes.by_base_branch("main");
    assert_eq!(by_branch.len(), 1);
    assert_eq!(by_branch[0].created_branch.as_deref(), Some("release_2024.06.01.1"));
    assert_eq!(by_branch[0].created_tag.as_deref(), Some("v_2024.06.01"));
    assert_eq!(loaded.indexes.by_date(now().date_naive()).len(), 1);
}

/// A conflicting branch is aborted and skipped; the rest still merges.
#[test]
fn conflicting_merge_is_aborted_and_skipped() {
    let repo = TestRepo::new().expect("repo");
    repo.branch_with_commit("left", "shared.txt", "left\n").expect("left");
    repo.branch_with_commit("right", "shared.txt", "right\n").expect("right");
    repo.branch_with_commit("clean", "clean.txt", "clean\n").expect("clean");

    let mut workflow = Workflow::new(
        Git::new(repo.path()),
        RefCache::new("origin", RefreshMode::LocalOnly),
    );
    let request = RunRequest {
        toggles: StepToggles {
            merge: true,
            ..StepToggles::default()
        },
        selection: MergeSelection {
            branches: vec!["left".to_string(), "right".to_string(), "clean".to_string()],
            tags: Vec::new(),
        },
        ..RunRequest::default()
    };

    let report = workflow
        .execute(&request, &FixedPolicy(MergeDecision::Skip), now())
        .expect("execute");
    let StepOutcome::Done(outcome) = &report.merge else {
        panic!("merge step should complete: {:?}", report.merge);
    };
    let names: Vec<_> = outcome
        .merged
        .iter()
        .map(|item| item.ref_display_name.as_str())
        .collect();
    assert_eq!(names, vec!["left", "clean"]);
    assert_eq!(outcome.failures.len(), 1);
    assert!(report.is_partial());

    assert_eq!(repo.git(&["status", "--porcelain"]).expect("status"), "");
    let shared = std::fs::read_to_string(repo.path().join("shared.txt")).expect("read");
    assert_eq!(shared, "left\n");
    assert_eq!(report.draft.base_branch, "main");
}

/// Remote-only branches are listed without the remote prefix and merge from
/// the remote-tracking ref.
#[test]
fn remote_only_branch_is_listed_and_merged() {
    let repo = TestRepo::new().expect("repo");
    repo.branch_with_commit("shared-work", "s.txt", "s\n").expect("branch");
    repo.make_remote_only("shared-work").expect("remote only");

    let mut workflow = Workflow::new(
        Git::new(repo.path()),
        RefCache::new("origin", RefreshMode::Fetch),
    );
    let snapshot = workflow.refresh().expect("refresh").clone();
    assert!(snapshot.remote_branches.contains("shared-work"));
    assert!(!snapshot.remote_branches.contains("main"));
    assert!(snapshot.local_branches.is_empty());

    let request = RunRequest {
        toggles: StepToggles {
            merge: true,
            ..StepToggles::default()
        },
        selection: MergeSelection {
            branches: vec!["shared-work".to_string()],
            tags: Vec::new(),
        },
        ..RunRequest::default()
    };
    let report = workflow
        .execute(&request, &FixedPolicy(MergeDecision::Stop), now())
        .expect("execute");
    assert!(!report.is_partial());
    assert_eq!(report.draft.merged_items[0].ref_display_name, "shared-work");
    assert!(repo.path().join("s.txt").exists());
}
