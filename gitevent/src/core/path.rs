//! Helpers for rendering deterministic event storage paths.

use std::path::{Path, PathBuf};

use crate::core::types::WorkflowEvent;

pub const EVENT_EXTENSION: &str = "json";
const DETACHED: &str = "@detached";

/// Directory name for an event's calendar date (`YYYY-MM-DD`).
pub fn date_dir_name(event: &WorkflowEvent) -> String {
    event.date().format("%Y-%m-%d").to_string()
}

/// File name from time-of-day and sanitized base branch, e.g.
/// `143005_feature+x.json`.
pub fn event_file_name(event: &WorkflowEvent) -> String {
    format!(
        "{}_{}.{EVENT_EXTENSION}",
        event.timestamp.format("%H%M%S"),
        sanitize_branch(&event.base_branch)
    )
}

/// Full path of `event` under the storage root.
pub fn event_path(root: &Path, event: &WorkflowEvent) -> PathBuf {
    root.join(date_dir_name(event)).join(event_file_name(event))
}

/// Encode a branch name as a file name component.
///
/// `[A-Za-z0-9._-]` is kept, `/` becomes `+` and every other byte becomes
/// `%XX`. Distinct branches always give distinct names; an empty branch
/// becomes `@detached`, which no branch encodes to.
pub fn sanitize_branch(branch: &str) -> String {
    let trimmed = branch.trim();
    if trimmed.is_empty() {
        return DETACHED.to_string();
    }
    let mut out = String::with_capacity(trimmed.len());
    for byte in trimmed.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(char::from(byte));
            }
            b'/' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn event(timestamp: &str, base_branch: &str) -> WorkflowEvent {
        WorkflowEvent {
            title: "t".to_string(),
            timestamp: DateTime::parse_from_rfc3339(timestamp).expect("timestamp"),
            description: String::new(),
            created_branch: None,
            created_tag: None,
            base_branch: base_branch.to_string(),
            merged_items: Vec::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn sanitize_encodes_separators() {
        assert_eq!(sanitize_branch("feature/login fix"), "feature+login%20fix");
        assert_eq!(sanitize_branch("release_2024.01.01-rc"), "release_2024.01.01-rc");
        assert_eq!(sanitize_branch("a+b%c"), "a%2Bb%25c");
        assert_eq!(sanitize_branch(""), "@detached");
    }

    #[test]
    fn slash_and_underscore_branches_get_distinct_names() {
        assert_ne!(sanitize_branch("feature/x"), sanitize_branch("feature_x"));
        assert_ne!(sanitize_branch("@detached"), sanitize_branch(""));
    }

    #[test]
    fn event_path_uses_local_date_and_time_of_day() {
        let e = event("2024-03-05T23:59:58+08:00", "feature/a");
        let path = event_path(Path::new("/store"), &e);
        assert_eq!(path, PathBuf::from("/store/2024-03-05/235958_feature+a.json"));
    }

    #[test]
    fn same_second_different_branches_do_not_collide() {
        let a = event("2024-03-05T10:00:00Z", "dev");
        let b = event("2024-03-05T10:00:00Z", "main");
        assert_ne!(event_file_name(&a), event_file_name(&b));
    }
}
