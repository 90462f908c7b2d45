//! Typed workflow error taxonomy.
//!
//! Fallible functions return `anyhow::Result`; these values travel inside the
//! `anyhow::Error` and are recovered with `downcast_ref` where a caller needs to
//! tell the cases apart (exit codes, draft retention).

use thiserror::Error;

use crate::core::types::RefKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Network or auth failure while talking to the remote.
    #[error("remote unavailable during {operation}: {message}")]
    RemoteUnavailable { operation: String, message: String },

    /// A branch/tag name could not be produced from the operator's inputs.
    #[error("{kind} name cannot be empty")]
    EmptyName { kind: RefKind },

    /// A single merge attempt failed (the merge has been aborted).
    #[error("failed to merge {kind} {name}: {message}")]
    MergeFailure {
        kind: RefKind,
        name: String,
        message: String,
    },

    /// File I/O failure on save or load of an event record.
    #[error("event store {operation} failed for {path}: {message}")]
    Persistence {
        operation: String,
        path: String,
        message: String,
    },

    #[error("nothing selected: choose at least one branch or tag")]
    NothingSelected,

    #[error("no operation selected: enable create-branch, merge or create-tag")]
    NoOperationSelected,

    #[error("event title cannot be empty")]
    EmptyTitle,

    #[error("no workflow run recorded (run `gitevent run` first)")]
    NoRunRecorded,
}

impl WorkflowError {
    pub fn remote(operation: &str, err: &anyhow::Error) -> Self {
        Self::RemoteUnavailable {
            operation: operation.to_string(),
            message: format!("{err:#}"),
        }
    }

    pub fn persistence(operation: &str, path: &std::path::Path, err: &anyhow::Error) -> Self {
        Self::Persistence {
            operation: operation.to_string(),
            path: path.display().to_string(),
            message: format!("{err:#}"),
        }
    }
}

/// Return the typed workflow error carried by `err`, if any.
pub fn workflow_error(err: &anyhow::Error) -> Option<&WorkflowError> {
    err.downcast_ref::<WorkflowError>()
        .or_else(|| err.chain().find_map(|cause| cause.downcast_ref::<WorkflowError>()))
}
