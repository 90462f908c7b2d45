//! Git adapter for workflow commands.
//!
//! [`VersionControl`] is the seam between the workflow and the repository: the
//! orchestration code only sequences these calls. [`Git`] implements it by
//! running the `git` executable; tests use scripted fakes.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use chrono::DateTime;
use tracing::{debug, instrument, warn};

use crate::core::types::CommitInfo;

/// Repository operations the workflow depends on.
pub trait VersionControl {
    /// Name of the checked-out branch (errors on detached HEAD).
    fn current_branch(&self) -> Result<String>;
    fn local_branches(&self) -> Result<Vec<String>>;
    /// Remote refs as `<remote>/<name>`, including the `<remote>/HEAD` marker
    /// when the remote has one.
    fn remote_refs(&self, remote: &str) -> Result<Vec<String>>;
    fn tags(&self) -> Result<Vec<String>>;
    /// Fetch from `remote`; `tags_only` fetches just tags.
    fn fetch(&self, remote: &str, tags_only: bool) -> Result<()>;
    fn checkout(&self, rev: &str) -> Result<()>;
    /// Create `branch` at the current HEAD and check it out.
    fn create_branch(&self, branch: &str) -> Result<()>;
    /// Merge `rev` into the current branch, always creating a merge commit.
    fn merge_no_ff(&self, rev: &str) -> Result<()>;
    fn merge_abort(&self) -> Result<()>;
    /// Create a lightweight tag at the current HEAD.
    fn create_tag(&self, tag: &str) -> Result<()>;
    fn push_branch_upstream(&self, remote: &str, branch: &str) -> Result<()>;
    fn push_tag(&self, remote: &str, tag: &str) -> Result<()>;
    /// Commit a rev points to (tags are peeled to their target commit).
    fn commit_info(&self, rev: &str) -> Result<CommitInfo>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Absolute path of the repository's git directory.
    pub fn git_dir(&self) -> Result<PathBuf> {
        let out = self.run_capture(&["rev-parse", "--git-dir"])?;
        let dir = PathBuf::from(out.trim());
        if dir.is_absolute() {
            Ok(dir)
        } else {
            Ok(self.workdir.join(dir))
        }
    }

    /// Root of the working tree.
    pub fn toplevel(&self) -> Result<PathBuf> {
        let out = self
            .run_capture(&["rev-parse", "--show-toplevel"])
            .context("not inside a git working tree")?;
        Ok(PathBuf::from(out.trim()))
    }

    fn for_each_ref(&self, pattern: &str) -> Result<Vec<String>> {
        let out = self.run_capture(&["for-each-ref", "--format=%(refname)", pattern])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // Merge conflicts are reported on stdout.
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(anyhow!("git {} failed: {}", args.join(" "), detail));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl VersionControl for Git {
    #[instrument(skip_all)]
    fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (check out a branch first)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        let refs = self.for_each_ref("refs/heads")?;
        Ok(strip_ref_prefix(&refs, "refs/heads/"))
    }

    fn remote_refs(&self, remote: &str) -> Result<Vec<String>> {
        let refs = self.for_each_ref(&format!("refs/remotes/{remote}"))?;
        Ok(strip_ref_prefix(&refs, "refs/remotes/"))
    }

    fn tags(&self) -> Result<Vec<String>> {
        let refs = self.for_each_ref("refs/tags")?;
        Ok(strip_ref_prefix(&refs, "refs/tags/"))
    }

    #[instrument(skip_all, fields(remote, tags_only))]
    fn fetch(&self, remote: &str, tags_only: bool) -> Result<()> {
        debug!(remote, tags_only, "fetching");
        if tags_only {
            self.run_checked(&["fetch", "--tags", remote])?;
        } else {
            self.run_checked(&["fetch", remote])?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(rev))]
    fn checkout(&self, rev: &str) -> Result<()> {
        debug!(rev, "checking out");
        self.run_checked(&["checkout", rev])?;
        Ok(())
    }

    #[instrument(skip_all, fields(branch))]
    fn create_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "creating and checking out new branch");
        self.run_checked(&["checkout", "-b", branch])?;
        Ok(())
    }

    #[instrument(skip_all, fields(rev))]
    fn merge_no_ff(&self, rev: &str) -> Result<()> {
        debug!(rev, "merging with --no-ff");
        self.run_checked(&["merge", "--no-ff", "--no-edit", rev])?;
        Ok(())
    }

    #[instrument(skip_all)]
    fn merge_abort(&self) -> Result<()> {
        debug!("aborting merge");
        self.run_checked(&["merge", "--abort"])?;
        Ok(())
    }

    #[instrument(skip_all, fields(tag))]
    fn create_tag(&self, tag: &str) -> Result<()> {
        debug!(tag, "creating tag");
        self.run_checked(&["tag", tag])?;
        Ok(())
    }

    #[instrument(skip_all, fields(remote, branch))]
    fn push_branch_upstream(&self, remote: &str, branch: &str) -> Result<()> {
        debug!(remote, branch, "pushing branch with upstream");
        self.run_checked(&["push", "--set-upstream", remote, branch])?;
        Ok(())
    }

    #[instrument(skip_all, fields(remote, tag))]
    fn push_tag(&self, remote: &str, tag: &str) -> Result<()> {
        debug!(remote, tag, "pushing tag");
        let refspec = format!("refs/tags/{tag}");
        self.run_checked(&["push", remote, &refspec])?;
        Ok(())
    }

    fn commit_info(&self, rev: &str) -> Result<CommitInfo> {
        let peeled = format!("{rev}^{{commit}}");
        let out = self.run_capture(&["show", "-s", COMMIT_FORMAT, &peeled, "--"])?;
        parse_commit_info(&out).with_context(|| format!("read commit for {rev}"))
    }
}

/// Fields separated by the ASCII unit separator; the message goes last since it
/// may span lines.
const COMMIT_FORMAT: &str = "--format=%H%x1f%an%x1f%cI%x1f%B";

fn parse_commit_info(raw: &str) -> Result<CommitInfo> {
    let mut parts = raw.splitn(4, '\u{1f}');
    let id = parts.next().map(str::trim).unwrap_or_default();
    let author = parts
        .next()
        .ok_or_else(|| anyhow!("missing author in commit output"))?;
    let timestamp = parts
        .next()
        .ok_or_else(|| anyhow!("missing timestamp in commit output"))?;
    let message = parts.next().unwrap_or_default();
    if id.is_empty() {
        return Err(anyhow!("missing commit id in commit output"));
    }
    let timestamp = DateTime::parse_from_rfc3339(timestamp.trim())
        .with_context(|| format!("parse commit timestamp '{}'", timestamp.trim()))?;
    Ok(CommitInfo {
        id: id.to_string(),
        message: message.trim().to_string(),
        author: author.trim().to_string(),
        timestamp,
    })
}

fn strip_ref_prefix(refs: &[String], prefix: &str) -> Vec<String> {
    refs.iter()
        .filter_map(|name| name.strip_prefix(prefix))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commit_with_multiline_message() {
        let raw = "0123456789abcdef\u{1f}Ann Lee\u{1f}2024-02-03T04:05:06+08:00\u{1f}feat: a\n\nbody line\n\n";
        let info = parse_commit_info(raw).expect("parse");
        assert_eq!(info.id, "0123456789abcdef");
        assert_eq!(info.author, "Ann Lee");
        assert_eq!(info.message, "feat: a\n\nbody line");
        assert_eq!(info.timestamp.to_rfc3339(), "2024-02-03T04:05:06+08:00");
    }

    #[test]
    fn rejects_truncated_commit_output() {
        let err = parse_commit_info("abc\u{1f}Ann").unwrap_err();
        assert!(err.to_string().contains("missing timestamp"));
    }

    #[test]
    fn strips_ref_namespace() {
        let refs = vec![
            "refs/remotes/origin/HEAD".to_string(),
            "refs/remotes/origin/feature/x".to_string(),
        ];
        assert_eq!(
            strip_ref_prefix(&refs, "refs/remotes/"),
            vec!["origin/HEAD", "origin/feature/x"]
        );
    }
}
