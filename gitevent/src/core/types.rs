//! Shared deterministic types for the workflow core.
//!
//! These types define stable contracts between components and the persisted
//! event format. They hold no handles to the repository or the filesystem.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Kind of ref a name or merge item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Branch,
    Tag,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch => f.write_str("branch"),
            Self::Tag => f.write_str("tag"),
        }
    }
}

/// Point-in-time view of the repository's refs.
///
/// `local_branches` and `remote_branches` are disjoint and never contain
/// `current_branch`. A snapshot is replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSnapshot {
    /// Remote the remote branch names were read from (e.g. `origin`).
    pub remote: String,
    pub current_branch: String,
    pub local_branches: BTreeSet<String>,
    /// Remote branch names with the `<remote>/` prefix stripped.
    pub remote_branches: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

impl RefSnapshot {
    /// Every branch name in use, for collision checks.
    pub fn branch_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        names.insert(self.current_branch.clone());
        names.extend(self.local_branches.iter().cloned());
        names.extend(self.remote_branches.iter().cloned());
        names
    }

    pub fn tag_names(&self) -> BTreeSet<String> {
        self.tags.clone()
    }

    /// Name space a new ref of `kind` must not collide with.
    pub fn names_for(&self, kind: RefKind) -> BTreeSet<String> {
        match kind {
            RefKind::Branch => self.branch_names(),
            RefKind::Tag => self.tag_names(),
        }
    }

    pub fn is_remote_only(&self, branch: &str) -> bool {
        self.remote_branches.contains(branch)
    }

    /// Map a selected branch name to the concrete ref to check out or merge.
    ///
    /// Remote-only branches resolve to `<remote>/<name>`; everything else is
    /// passed through unchanged.
    pub fn resolve_branch(&self, branch: &str) -> String {
        if self.is_remote_only(branch) {
            format!("{}/{}", self.remote, branch)
        } else {
            branch.to_string()
        }
    }
}

/// Commit metadata read from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full object id.
    pub id: String,
    pub message: String,
    pub author: String,
    /// Committer timestamp.
    pub timestamp: DateTime<FixedOffset>,
}

impl CommitInfo {
    pub fn short_id(&self) -> String {
        self.id.chars().take(SHORT_ID_LEN).collect()
    }
}

pub const SHORT_ID_LEN: usize = 8;

/// Provenance of one successfully merged ref.
///
/// Older records may lack `kind`, in which case a `tag:` name prefix marks a
/// tag. Missing commit fields read as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredMergeItem")]
pub struct MergeItemResult {
    #[serde(rename = "name")]
    pub ref_display_name: String,
    pub kind: RefKind,
    #[serde(rename = "commit_id")]
    pub short_commit_id: String,
    #[serde(rename = "message")]
    pub commit_message: String,
    #[serde(rename = "author")]
    pub commit_author: String,
    #[serde(rename = "timestamp")]
    pub commit_timestamp: Option<DateTime<FixedOffset>>,
}

impl MergeItemResult {
    pub fn from_commit(name: &str, kind: RefKind, commit: &CommitInfo) -> Self {
        Self {
            ref_display_name: name.to_string(),
            kind,
            short_commit_id: commit.short_id(),
            commit_message: commit.message.trim().to_string(),
            commit_author: commit.author.clone(),
            commit_timestamp: Some(commit.timestamp),
        }
    }
}

#[derive(Deserialize)]
struct StoredMergeItem {
    name: String,
    #[serde(default)]
    kind: Option<RefKind>,
    #[serde(default)]
    commit_id: String,
    #[serde(default, alias = "commit_message")]
    message: String,
    #[serde(default, alias = "commit_author")]
    author: String,
    #[serde(default)]
    timestamp: Option<DateTime<FixedOffset>>,
}

impl From<StoredMergeItem> for MergeItemResult {
    fn from(stored: StoredMergeItem) -> Self {
        let (kind, name) = match stored.kind {
            Some(kind) => (kind, stored.name),
            None => match stored.name.strip_prefix("tag:").map(str::to_string) {
                Some(tag) => (RefKind::Tag, tag),
                None => (RefKind::Branch, stored.name),
            },
        };
        Self {
            ref_display_name: name,
            kind,
            short_commit_id: stored.commit_id,
            commit_message: stored.message,
            commit_author: stored.author,
            commit_timestamp: stored.timestamp,
        }
    }
}

/// Persisted record of one workflow run.
///
/// Only `title` and `timestamp` are required on disk; fields added later
/// default when reading older records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub title: String,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_branch: Option<String>,
    #[serde(default)]
    pub created_tag: Option<String>,
    #[serde(default)]
    pub base_branch: String,
    #[serde(default)]
    pub merged_items: Vec<MergeItemResult>,
    #[serde(default)]
    pub notes: String,
}

impl WorkflowEvent {
    /// Calendar date the event is filed under.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Operator-entered fields of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDetails {
    pub title: String,
    pub description: String,
    pub notes: String,
}

/// Accumulated state of the most recent `execute`, before it is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDraft {
    pub executed_at: DateTime<FixedOffset>,
    pub base_branch: String,
    #[serde(default)]
    pub created_branch: Option<String>,
    #[serde(default)]
    pub created_tag: Option<String>,
    #[serde(default)]
    pub merged_items: Vec<MergeItemResult>,
}

impl RunDraft {
    pub fn new(executed_at: DateTime<FixedOffset>, base_branch: impl Into<String>) -> Self {
        Self {
            executed_at,
            base_branch: base_branch.into(),
            created_branch: None,
            created_tag: None,
            merged_items: Vec::new(),
        }
    }

    /// Materialize an event stamped at `timestamp`.
    pub fn to_event(&self, details: &EventDetails, timestamp: DateTime<FixedOffset>) -> WorkflowEvent {
        WorkflowEvent {
            title: details.title.clone(),
            timestamp,
            description: details.description.clone(),
            created_branch: self.created_branch.clone(),
            created_tag: self.created_tag.clone(),
            base_branch: self.base_branch.clone(),
            merged_items: self.merged_items.clone(),
            notes: details.notes.clone(),
        }
    }
}

/// Which workflow steps the operator enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepToggles {
    pub create_branch: bool,
    pub merge: bool,
    pub create_tag: bool,
}

impl StepToggles {
    pub fn any(&self) -> bool {
        self.create_branch || self.merge || self.create_tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RefSnapshot {
        RefSnapshot {
            remote: "origin".to_string(),
            current_branch: "main".to_string(),
            local_branches: ["dev".to_string()].into_iter().collect(),
            remote_branches: ["release".to_string()].into_iter().collect(),
            tags: ["v1".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn branch_names_include_current_local_and_remote() {
        let names = snapshot().branch_names();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["dev", "main", "release"]);
    }

    #[test]
    fn resolve_branch_qualifies_remote_only_names() {
        let snap = snapshot();
        assert_eq!(snap.resolve_branch("release"), "origin/release");
        assert_eq!(snap.resolve_branch("dev"), "dev");
        assert_eq!(snap.resolve_branch("unknown"), "unknown");
    }

    #[test]
    fn event_without_merge_list_defaults_to_empty() {
        let raw = r#"{"title":"t","timestamp":"2024-01-01T10:00:00+08:00"}"#;
        let event: WorkflowEvent = serde_json::from_str(raw).expect("parse");
        assert!(event.merged_items.is_empty());
        assert_eq!(event.created_branch, None);
        assert_eq!(event.base_branch, "");
    }

    #[test]
    fn merge_item_without_kind_infers_it_from_the_name() {
        let raw = r#"[
            {"name":"tag:v1","commit_id":"0123abcd","commit_message":"release"},
            {"name":"feature-a"}
        ]"#;
        let items: Vec<MergeItemResult> = serde_json::from_str(raw).expect("parse");
        assert_eq!(items[0].kind, RefKind::Tag);
        assert_eq!(items[0].ref_display_name, "v1");
        assert_eq!(items[0].commit_message, "release");
        assert_eq!(items[1].kind, RefKind::Branch);
        assert_eq!(items[1].short_commit_id, "");
        assert_eq!(items[1].commit_timestamp, None);
    }

    #[test]
    fn merge_item_takes_eight_char_short_id_and_trims_message() {
        let commit = CommitInfo {
            id: "0123456789abcdef0123".to_string(),
            message: "fix: thing\n\n".to_string(),
            author: "Ann".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").expect("ts"),
        };
        let item = MergeItemResult::from_commit("dev", RefKind::Branch, &commit);
        assert_eq!(item.short_commit_id, "01234567");
        assert_eq!(item.commit_message, "fix: thing");
    }
}
