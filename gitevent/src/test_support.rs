//! Test helpers: a scripted repository, scripted operator decisions and a
//! throwaway git repository with a bare `origin`.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use chrono::DateTime;
use tempfile::TempDir;

use crate::core::types::CommitInfo;
use crate::io::git::VersionControl;
use crate::merge::{FailureHandler, MergeDecision, MergeFailure};

#[derive(Debug, Default)]
struct VcsState {
    current: String,
    local: BTreeSet<String>,
    remote: BTreeSet<String>,
    tags: BTreeSet<String>,
    commits: BTreeMap<String, CommitInfo>,
    failing_merges: BTreeMap<String, String>,
    fetch_error: Option<String>,
    abort_error: Option<String>,
    tag_error: Option<String>,
    push_error: Option<String>,
    calls: Vec<String>,
}

/// In-memory [`VersionControl`] that records every mutating call.
///
/// Listing calls are not recorded; `calls()` shows what the code under test
/// asked the repository to do, in order.
#[derive(Debug, Default)]
pub struct ScriptedVcs {
    state: RefCell<VcsState>,
}

impl ScriptedVcs {
    /// Repository with `current` checked out.
    pub fn new(current: &str) -> Self {
        let vcs = Self::default();
        {
            let mut state = vcs.state.borrow_mut();
            state.current = current.to_string();
            state.local.insert(current.to_string());
        }
        vcs
    }

    pub fn with_local(self, names: &[&str]) -> Self {
        self.state
            .borrow_mut()
            .local
            .extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Remote refs in `<remote>/<name>` form.
    pub fn with_remote(self, refs: &[&str]) -> Self {
        self.state
            .borrow_mut()
            .remote
            .extend(refs.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_tags(self, names: &[&str]) -> Self {
        self.state
            .borrow_mut()
            .tags
            .extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Pin the commit `rev` resolves to.
    pub fn with_commit(self, rev: &str, commit: CommitInfo) -> Self {
        self.state
            .borrow_mut()
            .commits
            .insert(rev.to_string(), commit);
        self
    }

    pub fn add_local(&self, name: &str) {
        self.state.borrow_mut().local.insert(name.to_string());
    }

    pub fn add_tag(&self, name: &str) {
        self.state.borrow_mut().tags.insert(name.to_string());
    }

    pub fn fail_fetch(&self, message: &str) {
        self.state.borrow_mut().fetch_error = Some(message.to_string());
    }

    /// Make merging `rev` fail with `message`.
    pub fn fail_merge(&self, rev: &str, message: &str) {
        self.state
            .borrow_mut()
            .failing_merges
            .insert(rev.to_string(), message.to_string());
    }

    pub fn fail_abort(&self, message: &str) {
        self.state.borrow_mut().abort_error = Some(message.to_string());
    }

    pub fn fail_tag(&self, message: &str) {
        self.state.borrow_mut().tag_error = Some(message.to_string());
    }

    pub fn fail_push(&self, message: &str) {
        self.state.borrow_mut().push_error = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn current(&self) -> String {
        self.state.borrow().current.clone()
    }

    fn record(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }

    fn knows(&self, rev: &str) -> bool {
        let state = self.state.borrow();
        state.local.contains(rev)
            || state.remote.contains(rev)
            || state.tags.contains(rev)
            || state.commits.contains_key(rev)
    }
}

/// Deterministic commit for a rev that was never pinned.
fn synthetic_commit(rev: &str) -> Result<CommitInfo> {
    // FNV-1a keeps ids stable across runs.
    let hash = rev.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| {
        (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    });
    Ok(CommitInfo {
        id: format!("{hash:016x}{:024}", 0),
        message: format!("tip of {rev}\n"),
        author: "Scripted Author".to_string(),
        timestamp: DateTime::parse_from_rfc3339("2024-01-02T03:04:05+00:00")?,
    })
}

impl VersionControl for ScriptedVcs {
    fn current_branch(&self) -> Result<String> {
        Ok(self.state.borrow().current.clone())
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        Ok(self.state.borrow().local.iter().cloned().collect())
    }

    fn remote_refs(&self, remote: &str) -> Result<Vec<String>> {
        let prefix = format!("{remote}/");
        Ok(self
            .state
            .borrow()
            .remote
            .iter()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn tags(&self) -> Result<Vec<String>> {
        Ok(self.state.borrow().tags.iter().cloned().collect())
    }

    fn fetch(&self, remote: &str, tags_only: bool) -> Result<()> {
        self.record(if tags_only {
            format!("fetch --tags {remote}")
        } else {
            format!("fetch {remote}")
        });
        match &self.state.borrow().fetch_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn checkout(&self, rev: &str) -> Result<()> {
        self.record(format!("checkout {rev}"));
        if !self.knows(rev) {
            bail!("pathspec '{rev}' did not match any file(s) known to git");
        }
        let mut state = self.state.borrow_mut();
        // Checking out a remote-only name creates the tracking branch.
        if !state.tags.contains(rev) {
            state.local.insert(rev.to_string());
        }
        state.current = rev.to_string();
        Ok(())
    }

    fn create_branch(&self, branch: &str) -> Result<()> {
        self.record(format!("checkout -b {branch}"));
        let mut state = self.state.borrow_mut();
        if !state.local.insert(branch.to_string()) {
            bail!("a branch named '{branch}' already exists");
        }
        state.current = branch.to_string();
        Ok(())
    }

    fn merge_no_ff(&self, rev: &str) -> Result<()> {
        self.record(format!("merge --no-ff {rev}"));
        match self.state.borrow().failing_merges.get(rev) {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn merge_abort(&self) -> Result<()> {
        self.record("merge --abort".to_string());
        match &self.state.borrow().abort_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn create_tag(&self, tag: &str) -> Result<()> {
        self.record(format!("tag {tag}"));
        let mut state = self.state.borrow_mut();
        if let Some(message) = &state.tag_error {
            return Err(anyhow!("{message}"));
        }
        if !state.tags.insert(tag.to_string()) {
            bail!("tag '{tag}' already exists");
        }
        Ok(())
    }

    fn push_branch_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        self.record(format!("push --set-upstream {remote} {branch}"));
        match &self.state.borrow().push_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn push_tag(&self, remote: &str, tag: &str) -> Result<()> {
        self.record(format!("push {remote} refs/tags/{tag}"));
        match &self.state.borrow().push_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn commit_info(&self, rev: &str) -> Result<CommitInfo> {
        if let Some(commit) = self.state.borrow().commits.get(rev) {
            return Ok(commit.clone());
        }
        if !self.knows(rev) {
            bail!("unknown revision '{rev}'");
        }
        synthetic_commit(rev)
    }
}

/// Failure handler that replays queued decisions and remembers what it was
/// asked about. Stops once the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    decisions: RefCell<VecDeque<MergeDecision>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedDecisions {
    pub fn new(decisions: Vec<MergeDecision>) -> Self {
        Self {
            decisions: RefCell::new(decisions.into()),
            asked: RefCell::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

impl FailureHandler for ScriptedDecisions {
    fn on_failure(&self, failure: &MergeFailure) -> MergeDecision {
        self.asked.borrow_mut().push(failure.name.clone());
        self.decisions
            .borrow_mut()
            .pop_front()
            .unwrap_or(MergeDecision::Stop)
    }
}

/// Working clone on `main` with a bare `origin`, both in a temp dir.
pub struct TestRepo {
    _temp: TempDir,
    work: PathBuf,
    origin: PathBuf,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        let origin = temp.path().join("origin.git");
        let work = temp.path().join("work");
        fs::create_dir_all(&work).context("create work dir")?;

        git(temp.path(), &["init", "--bare", "origin.git"])?;
        git(&origin, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        git(&work, &["init"])?;
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        git(&work, &["config", "user.email", "test@example.com"])?;
        git(&work, &["config", "user.name", "test"])?;
        git(&work, &["config", "commit.gpgsign", "false"])?;
        git(&work, &["config", "tag.gpgsign", "false"])?;

        let repo = Self {
            _temp: temp,
            work,
            origin,
        };
        repo.commit_file("README.md", "hi\n", "initial commit")?;
        let origin_url = repo.origin.display().to_string();
        repo.git(&["remote", "add", "origin", &origin_url])?;
        repo.git(&["push", "-u", "origin", "main"])?;
        Ok(repo)
    }

    /// Working tree root.
    pub fn path(&self) -> &Path {
        &self.work
    }

    pub fn origin_path(&self) -> &Path {
        &self.origin
    }

    /// Run git in the working tree and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        git(&self.work, args)
    }

    pub fn commit_file(&self, name: &str, contents: &str, message: &str) -> Result<()> {
        fs::write(self.work.join(name), contents)
            .with_context(|| format!("write {name}"))?;
        self.git(&["add", name])?;
        self.git(&["commit", "-m", message])?;
        Ok(())
    }

    /// Create `branch` off `main` with one commit writing `file`, then return
    /// to `main`.
    pub fn branch_with_commit(&self, branch: &str, file: &str, contents: &str) -> Result<()> {
        self.git(&["checkout", "-b", branch, "main"])?;
        self.commit_file(file, contents, &format!("work on {branch}"))?;
        self.git(&["checkout", "main"])?;
        Ok(())
    }

    /// Publish `branch` to origin and delete the local copy, leaving it
    /// remote-only.
    pub fn make_remote_only(&self, branch: &str) -> Result<()> {
        self.git(&["push", "origin", branch])?;
        self.git(&["branch", "-D", branch])?;
        Ok(())
    }

    /// List refs under `prefix` in the bare origin.
    pub fn origin_refs(&self, prefix: &str) -> Result<Vec<String>> {
        let out = git(&self.origin, &["for-each-ref", "--format=%(refname)", prefix])?;
        Ok(out.lines().map(str::to_string).collect())
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
