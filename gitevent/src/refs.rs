//! Refreshable snapshot of the repository's branches and tags.
//!
//! The cache holds at most one [`RefSnapshot`]. A refresh builds a complete new
//! snapshot and swaps it in; on failure the previous snapshot stays.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::types::RefSnapshot;
use crate::error::WorkflowError;
use crate::io::git::VersionControl;

/// Whether a refresh talks to the remote first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Fetch branches, then tags, before enumerating.
    Fetch,
    /// Enumerate what is already known locally.
    LocalOnly,
}

#[derive(Debug, Clone)]
pub struct RefCache {
    remote: String,
    mode: RefreshMode,
    snapshot: Option<RefSnapshot>,
    /// Set when the first snapshot had to be read without fetching.
    remote_error: Option<WorkflowError>,
}

impl RefCache {
    pub fn new(remote: impl Into<String>, mode: RefreshMode) -> Self {
        Self {
            remote: remote.into(),
            mode,
            snapshot: None,
            remote_error: None,
        }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn mode(&self) -> RefreshMode {
        self.mode
    }

    pub fn snapshot(&self) -> Option<&RefSnapshot> {
        self.snapshot.as_ref()
    }

    /// Fetch (per mode), enumerate refs and replace the snapshot.
    ///
    /// A fetch failure surfaces as [`WorkflowError::RemoteUnavailable`] and
    /// leaves the previous snapshot in place.
    #[instrument(skip_all, fields(remote = %self.remote, mode = ?self.mode))]
    pub fn refresh<V: VersionControl>(&mut self, vcs: &V) -> Result<&RefSnapshot> {
        if self.mode == RefreshMode::Fetch {
            vcs.fetch(&self.remote, false)
                .map_err(|err| WorkflowError::remote("fetch", &err))?;
            vcs.fetch(&self.remote, true)
                .map_err(|err| WorkflowError::remote("fetch tags", &err))?;
        }
        let snapshot = read_snapshot(vcs, &self.remote)?;
        info!(
            current = %snapshot.current_branch,
            local = snapshot.local_branches.len(),
            remote = snapshot.remote_branches.len(),
            tags = snapshot.tags.len(),
            "ref cache refreshed"
        );
        Ok(self.snapshot.insert(snapshot))
    }

    /// Refresh after a mutation; failures are logged and the old snapshot kept.
    pub fn refresh_after_mutation<V: VersionControl>(&mut self, vcs: &V) {
        if let Err(err) = self.refresh(vcs) {
            warn!(err = %format!("{err:#}"), "ref cache refresh failed, keeping previous snapshot");
        }
    }

    /// Current snapshot, refreshing first if there is none yet.
    ///
    /// When the remote is unreachable and nothing was cached, the local refs
    /// are enumerated instead. The remote error is kept for
    /// [`take_remote_error`](Self::take_remote_error).
    pub fn ensure<V: VersionControl>(&mut self, vcs: &V) -> Result<&RefSnapshot> {
        if self.snapshot.is_none() {
            debug!("no snapshot yet, refreshing");
            let refreshed = self.refresh(vcs).map(|_| ());
            if let Err(err) = refreshed {
                let remote_error = match err.downcast::<WorkflowError>() {
                    Ok(remote @ WorkflowError::RemoteUnavailable { .. }) => remote,
                    Ok(other) => return Err(other.into()),
                    Err(err) => return Err(err),
                };
                warn!(err = %remote_error, "remote unavailable, using local refs");
                let snapshot = read_snapshot(vcs, &self.remote)?;
                self.remote_error = Some(remote_error);
                return Ok(self.snapshot.insert(snapshot));
            }
        }
        self.snapshot
            .as_ref()
            .context("ref snapshot missing after refresh")
    }

    /// Remote error from a fallback in [`ensure`](Self::ensure), if any.
    pub fn take_remote_error(&mut self) -> Option<WorkflowError> {
        self.remote_error.take()
    }
}

fn read_snapshot<V: VersionControl>(vcs: &V, remote: &str) -> Result<RefSnapshot> {
    let current_branch = vcs.current_branch().context("read current branch")?;

    let local_branches: BTreeSet<String> = vcs
        .local_branches()
        .context("list local branches")?
        .into_iter()
        .filter(|name| *name != current_branch)
        .collect();

    let remote_head = format!("{remote}/HEAD");
    let prefix = format!("{remote}/");
    let remote_branches: BTreeSet<String> = vcs
        .remote_refs(remote)
        .context("list remote branches")?
        .into_iter()
        .filter(|name| *name != remote_head)
        .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
        .filter(|name| *name != current_branch && !local_branches.contains(name))
        .collect();

    let tags: BTreeSet<String> = vcs.tags().context("list tags")?.into_iter().collect();

    Ok(RefSnapshot {
        remote: remote.to_string(),
        current_branch,
        local_branches,
        remote_branches,
        tags,
    })
}
