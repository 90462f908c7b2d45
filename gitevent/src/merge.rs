//! Sequential merge of a selected set of branches and tags.
//!
//! Every merge mutates the one working tree, so items run strictly in order:
//! branches first, then tags, each group in caller order. A failed merge is
//! aborted and the [`FailureHandler`] decides whether the rest still runs.

use anyhow::Result;
use tracing::{debug, error, info, instrument, warn};

use crate::core::types::{MergeItemResult, RefKind};
use crate::error::WorkflowError;
use crate::io::git::VersionControl;
use crate::refs::RefCache;

/// Operator choice after a failed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Discard this item and continue with the next one.
    Skip,
    /// Return the results accumulated so far.
    Stop,
}

/// A failed merge attempt, as presented to the operator.
#[derive(Debug)]
pub struct MergeFailure {
    pub kind: RefKind,
    pub name: String,
    pub error: anyhow::Error,
}

impl MergeFailure {
    pub fn to_error(&self) -> WorkflowError {
        WorkflowError::MergeFailure {
            kind: self.kind,
            name: self.name.clone(),
            message: format!("{:#}", self.error),
        }
    }
}

/// Decides how a merge run continues after a failure.
pub trait FailureHandler {
    fn on_failure(&self, failure: &MergeFailure) -> MergeDecision;
}

/// Same decision for every failure.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy(pub MergeDecision);

impl FailureHandler for FixedPolicy {
    fn on_failure(&self, _failure: &MergeFailure) -> MergeDecision {
        self.0
    }
}

/// Branches and tags chosen for merging, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSelection {
    pub branches: Vec<String>,
    pub tags: Vec<String>,
}

impl MergeSelection {
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty() && self.tags.is_empty()
    }
}

/// What happened during a merge run.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Provenance of each merged item, in processing order.
    pub merged: Vec<MergeItemResult>,
    /// Items whose merge failed, in processing order.
    pub failures: Vec<WorkflowError>,
    /// True when a failure ended the run before every item was tried.
    pub stopped: bool,
    /// Set when refs were read locally because the fetch failed.
    pub remote_unavailable: Option<WorkflowError>,
}

impl MergeOutcome {
    /// Names of the items that failed to merge, in processing order.
    pub fn failed_names(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter_map(|failure| match failure {
                WorkflowError::MergeFailure { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Merge every selected item into the current branch.
///
/// Errors with [`WorkflowError::NothingSelected`] before touching the
/// repository when the selection is empty. Per-item failures do not error;
/// they are recorded in the outcome. An unreachable remote is recorded too
/// when the refs had to be read locally.
#[instrument(skip_all, fields(branches = selection.branches.len(), tags = selection.tags.len()))]
pub fn merge_all<V: VersionControl, H: FailureHandler>(
    vcs: &V,
    cache: &mut RefCache,
    selection: &MergeSelection,
    handler: &H,
) -> Result<MergeOutcome> {
    if selection.is_empty() {
        return Err(WorkflowError::NothingSelected.into());
    }
    info!(
        branches = ?selection.branches,
        tags = ?selection.tags,
        "starting merge"
    );

    let snapshot = cache.ensure(vcs)?.clone();
    let mut outcome = MergeOutcome {
        remote_unavailable: cache.take_remote_error(),
        ..MergeOutcome::default()
    };
    let targets = selection
        .branches
        .iter()
        .map(|name| (RefKind::Branch, name.as_str(), snapshot.resolve_branch(name)))
        .chain(
            selection
                .tags
                .iter()
                .map(|name| (RefKind::Tag, name.as_str(), name.clone())),
        );

    for (kind, name, rev) in targets {
        match merge_one(vcs, kind, name, &rev) {
            Ok(item) => {
                info!(%kind, name, commit = %item.short_commit_id, "merged");
                outcome.merged.push(item);
            }
            Err(attempt) => {
                let failure = MergeFailure {
                    kind,
                    name: name.to_string(),
                    error: attempt.error,
                };
                warn!(%kind, name, err = %format!("{:#}", failure.error), "merge failed");
                outcome.failures.push(failure.to_error());

                if attempt.started && !abort(vcs) {
                    outcome.stopped = true;
                    break;
                }
                if handler.on_failure(&failure) == MergeDecision::Stop {
                    debug!(name, "operator stopped the merge run");
                    outcome.stopped = true;
                    break;
                }
                debug!(name, "operator skipped failed item");
            }
        }
    }

    cache.refresh_after_mutation(vcs);
    info!(
        merged = outcome.merged.len(),
        failed = outcome.failures.len(),
        stopped = outcome.stopped,
        "merge finished"
    );
    Ok(outcome)
}

struct FailedAttempt {
    /// Whether the merge command ran (and so may need aborting).
    started: bool,
    error: anyhow::Error,
}

fn merge_one<V: VersionControl>(
    vcs: &V,
    kind: RefKind,
    name: &str,
    rev: &str,
) -> std::result::Result<MergeItemResult, FailedAttempt> {
    let commit = vcs.commit_info(rev).map_err(|error| FailedAttempt {
        started: false,
        error,
    })?;
    let item = MergeItemResult::from_commit(name, kind, &commit);
    debug!(%kind, name, rev, commit = %item.short_commit_id, "merging");
    vcs.merge_no_ff(rev).map_err(|error| FailedAttempt {
        started: true,
        error,
    })?;
    Ok(item)
}

/// Abort the in-progress merge; false when the abort itself failed.
fn abort<V: VersionControl>(vcs: &V) -> bool {
    match vcs.merge_abort() {
        Ok(()) => true,
        Err(err) => {
            let err = err.context("merge --abort");
            error!(err = %format!("{err:#}"), "abort failed, working tree state unknown; stopping");
            false
        }
    }
}
