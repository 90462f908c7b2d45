//! Workflow coordinator: create branch, merge, create tag, then save.
//!
//! `execute` runs the enabled steps in that fixed order and keeps the result as
//! a [`RunDraft`]. There is no rollback: a failed step is reported and the
//! remaining steps still run. `save_event` turns the draft into a persisted
//! [`WorkflowEvent`](crate::core::types::WorkflowEvent).

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, instrument, warn};

use crate::core::names::NameSpec;
use crate::core::types::{EventDetails, RefKind, RefSnapshot, RunDraft, StepToggles};
use crate::error::WorkflowError;
use crate::io::event_store::EventStore;
use crate::io::git::VersionControl;
use crate::merge::{FailureHandler, MergeOutcome, MergeSelection, merge_all};
use crate::refs::{RefCache, RefreshMode};

/// Result of one workflow step.
#[derive(Debug)]
pub enum StepOutcome<T> {
    /// The step was not enabled.
    Disabled,
    Done(T),
    Failed(anyhow::Error),
}

impl<T> Default for StepOutcome<T> {
    fn default() -> Self {
        Self::Disabled
    }
}

impl<T> StepOutcome<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn done(&self) -> Option<&T> {
        match self {
            Self::Done(value) => Some(value),
            _ => None,
        }
    }

    fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Done(value),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Operator inputs for one `execute`.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub toggles: StepToggles,
    /// Name of the branch to create; required when branch creation is on.
    pub branch: Option<NameSpec>,
    /// Ref the new branch starts from; the current branch when unset.
    pub base_ref: Option<String>,
    pub selection: MergeSelection,
    /// Name of the tag to create; required when tag creation is on.
    pub tag: Option<NameSpec>,
}

#[derive(Debug)]
pub struct RunReport {
    pub branch: StepOutcome<String>,
    pub merge: StepOutcome<MergeOutcome>,
    pub tag: StepOutcome<String>,
    pub draft: RunDraft,
}

impl RunReport {
    /// True when any step failed, any merge item was not merged, or the
    /// merge ran on local refs because the remote was unreachable.
    pub fn is_partial(&self) -> bool {
        self.branch.is_failed()
            || self.merge.is_failed()
            || self.tag.is_failed()
            || self.merge.done().is_some_and(|outcome| {
                !outcome.failures.is_empty() || outcome.remote_unavailable.is_some()
            })
    }
}

/// What to publish with `push`.
#[derive(Debug, Clone, Default)]
pub struct PushRequest {
    /// Push the current branch with upstream tracking.
    pub branch: bool,
    pub tag: Option<String>,
}

#[derive(Debug, Default)]
pub struct PushReport {
    pub branch: StepOutcome<String>,
    pub tag: StepOutcome<String>,
}

impl PushReport {
    pub fn is_partial(&self) -> bool {
        self.branch.is_failed() || self.tag.is_failed()
    }
}

/// Sequences workflow steps against one repository.
pub struct Workflow<V> {
    vcs: V,
    cache: RefCache,
    draft: Option<RunDraft>,
}

impl<V: VersionControl> Workflow<V> {
    pub fn new(vcs: V, cache: RefCache) -> Self {
        Self {
            vcs,
            cache,
            draft: None,
        }
    }

    /// Resume with a draft recorded by an earlier run.
    pub fn with_draft(mut self, draft: Option<RunDraft>) -> Self {
        self.draft = draft;
        self
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn cache(&self) -> &RefCache {
        &self.cache
    }

    pub fn draft(&self) -> Option<&RunDraft> {
        self.draft.as_ref()
    }

    /// Refresh the ref cache and return the new snapshot.
    pub fn refresh(&mut self) -> Result<&RefSnapshot> {
        self.cache.refresh(&self.vcs)
    }

    /// Final, collision-free name for `spec` against the current snapshot.
    pub fn final_name(&mut self, spec: &NameSpec) -> Result<String> {
        let snapshot = self.cache.ensure(&self.vcs)?;
        spec.final_name(&snapshot.names_for(spec.kind))
    }

    /// Run every enabled step and replace the draft with the result.
    ///
    /// Errors only when no step is enabled or the current branch cannot be
    /// read; step failures are reported in the [`RunReport`].
    #[instrument(skip_all, fields(toggles = ?request.toggles))]
    pub fn execute<H: FailureHandler>(
        &mut self,
        request: &RunRequest,
        handler: &H,
        now: DateTime<FixedOffset>,
    ) -> Result<RunReport> {
        if !request.toggles.any() {
            return Err(WorkflowError::NoOperationSelected.into());
        }
        let start_branch = self
            .vcs
            .current_branch()
            .context("read current branch")?;
        let mut draft = RunDraft::new(now, start_branch.clone());
        let mut report = RunReport {
            branch: StepOutcome::Disabled,
            merge: StepOutcome::Disabled,
            tag: StepOutcome::Disabled,
            draft: draft.clone(),
        };

        if request.toggles.create_branch {
            let base = request.base_ref.clone().unwrap_or(start_branch);
            let result = self.create_branch_step(request.branch.as_ref(), &base);
            if let Ok(name) = &result {
                draft.created_branch = Some(name.clone());
                draft.base_branch = base;
            }
            report.branch = StepOutcome::from_result(result);
        }

        if request.toggles.merge {
            let result = merge_all(&self.vcs, &mut self.cache, &request.selection, handler);
            if let Ok(outcome) = &result {
                draft.merged_items = outcome.merged.clone();
            }
            report.merge = StepOutcome::from_result(result);
        }

        if request.toggles.create_tag {
            let (created, result) = self.create_tag_step(request.tag.as_ref());
            draft.created_tag = created;
            report.tag = StepOutcome::from_result(result);
        }

        info!(
            base_branch = %draft.base_branch,
            created_branch = ?draft.created_branch,
            merged = draft.merged_items.len(),
            created_tag = ?draft.created_tag,
            "run finished"
        );
        report.draft = draft.clone();
        self.draft = Some(draft);
        Ok(report)
    }

    fn create_branch_step(&mut self, spec: Option<&NameSpec>, base: &str) -> Result<String> {
        let spec = spec.ok_or(WorkflowError::EmptyName {
            kind: RefKind::Branch,
        })?;
        let name = self.final_name(spec)?;
        debug!(%name, base, "creating branch");
        self.vcs
            .checkout(base)
            .with_context(|| format!("checkout {base}"))?;
        let created = self
            .vcs
            .create_branch(&name)
            .with_context(|| format!("create branch {name}"));
        self.cache.refresh_after_mutation(&self.vcs);
        created?;
        info!(%name, base, "branch created");
        Ok(name)
    }

    /// Returns the tag name when it was created, even if the push failed.
    fn create_tag_step(&mut self, spec: Option<&NameSpec>) -> (Option<String>, Result<String>) {
        let name = match spec
            .ok_or_else(|| anyhow::Error::from(WorkflowError::EmptyName { kind: RefKind::Tag }))
            .and_then(|spec| self.final_name(spec))
        {
            Ok(name) => name,
            Err(err) => return (None, Err(err)),
        };
        debug!(%name, "creating tag");
        if let Err(err) = self.vcs.create_tag(&name) {
            return (None, Err(err.context(format!("create tag {name}"))));
        }
        info!(%name, "tag created");

        let pushed: Result<()> = if self.cache.mode() == RefreshMode::LocalOnly {
            debug!(%name, "local-only mode, tag not pushed");
            Ok(())
        } else {
            self.vcs
                .push_tag(self.cache.remote(), &name)
                .map_err(|err| WorkflowError::remote("push tag", &err).into())
        };
        self.cache.refresh_after_mutation(&self.vcs);
        (Some(name.clone()), pushed.map(|()| name))
    }

    /// Persist the draft as an event and clear it. The draft is kept when
    /// anything fails.
    #[instrument(skip_all, fields(title = %details.title))]
    pub fn save_event(
        &mut self,
        store: &EventStore,
        details: &EventDetails,
        now: DateTime<FixedOffset>,
    ) -> Result<PathBuf> {
        if details.title.trim().is_empty() {
            return Err(WorkflowError::EmptyTitle.into());
        }
        let draft = self.draft.as_ref().ok_or(WorkflowError::NoRunRecorded)?;
        let event = draft.to_event(details, now);
        let path = store.append(&event)?;
        self.draft = None;
        Ok(path)
    }

    /// Push the current branch and/or a tag to the remote.
    #[instrument(skip_all, fields(branch = request.branch, tag = ?request.tag))]
    pub fn push(&mut self, request: &PushRequest) -> Result<PushReport> {
        if !request.branch && request.tag.is_none() {
            return Err(WorkflowError::NothingSelected.into());
        }
        let remote = self.cache.remote().to_string();
        let mut report = PushReport::default();

        if request.branch {
            let result = self
                .vcs
                .current_branch()
                .context("read current branch")
                .and_then(|branch| {
                    self.vcs
                        .push_branch_upstream(&remote, &branch)
                        .map_err(|err| WorkflowError::remote("push branch", &err))?;
                    Ok(branch)
                });
            match &result {
                Ok(branch) => info!(%branch, %remote, "branch pushed"),
                Err(err) => warn!(err = %format!("{err:#}"), "branch push failed"),
            }
            report.branch = StepOutcome::from_result(result);
        }

        if let Some(tag) = &request.tag {
            let result: Result<String> = self
                .vcs
                .push_tag(&remote, tag)
                .map_err(|err| WorkflowError::remote("push tag", &err).into())
                .map(|()| tag.clone());
            match &result {
                Ok(tag) => info!(%tag, %remote, "tag pushed"),
                Err(err) => warn!(err = %format!("{err:#}"), "tag push failed"),
            }
            report.tag = StepOutcome::from_result(result);
        }

        self.cache.refresh_after_mutation(&self.vcs);
        Ok(report)
    }
}
