//! Newest-first views over loaded events and their text rendering.

use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::core::index::EventIndexes;
use crate::core::types::{MergeItemResult, RefKind, WorkflowEvent};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which events a history listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryView {
    All,
    Date(NaiveDate),
    BaseBranch(String),
}

/// Events for `view`, newest first. Ties keep load order.
pub fn select<'a>(indexes: &'a EventIndexes, view: &HistoryView) -> Vec<&'a WorkflowEvent> {
    let mut events: Vec<&WorkflowEvent> = match view {
        HistoryView::All => indexes.events().iter().collect(),
        HistoryView::Date(date) => indexes.by_date(*date),
        HistoryView::BaseBranch(branch) => indexes.by_base_branch(branch),
    };
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events
}

/// One line per event: time, title, base branch and what was created.
pub fn render_summary(event: &WorkflowEvent) -> String {
    let mut line = format!(
        "{}  {}  [base: {}]",
        event.timestamp.format(TIME_FORMAT),
        event.title,
        display_or_dash(&event.base_branch)
    );
    if let Some(branch) = &event.created_branch {
        let _ = write!(line, " branch: {branch}");
    }
    if let Some(tag) = &event.created_tag {
        let _ = write!(line, " tag: {tag}");
    }
    if !event.merged_items.is_empty() {
        let _ = write!(line, " merged: {}", event.merged_items.len());
    }
    line
}

/// Full record, including per-item merge provenance.
pub fn render_details(event: &WorkflowEvent) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Title:       {}", event.title);
    let _ = writeln!(out, "Date:        {}", event.timestamp.format(TIME_FORMAT));
    let _ = writeln!(out, "Base branch: {}", display_or_dash(&event.base_branch));
    if !event.description.is_empty() {
        let _ = writeln!(out, "Description: {}", event.description);
    }
    if let Some(branch) = &event.created_branch {
        let _ = writeln!(out, "Created branch: {branch}");
    }
    if let Some(tag) = &event.created_tag {
        let _ = writeln!(out, "Created tag:    {tag}");
    }
    if !event.merged_items.is_empty() {
        let _ = writeln!(out, "Merged:");
        for item in &event.merged_items {
            render_item(&mut out, item);
        }
    }
    if !event.notes.is_empty() {
        let _ = writeln!(out, "Notes: {}", event.notes);
    }
    out
}

/// Label a merged item the way the ref lists show it (`tag:` prefix for tags).
pub fn item_label(item: &MergeItemResult) -> String {
    match item.kind {
        RefKind::Branch => item.ref_display_name.clone(),
        RefKind::Tag => format!("tag: {}", item.ref_display_name),
    }
}

fn render_item(out: &mut String, item: &MergeItemResult) {
    let _ = writeln!(
        out,
        "  - {} @ {} by {} on {}",
        item_label(item),
        item.short_commit_id,
        item.commit_author,
        item.commit_timestamp
            .map_or_else(|| "-".to_string(), |ts| ts.format(TIME_FORMAT).to_string())
    );
    if let Some(subject) = item.commit_message.lines().next() {
        let _ = writeln!(out, "      {subject}");
    }
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn event(title: &str, timestamp: &str, base_branch: &str) -> WorkflowEvent {
        WorkflowEvent {
            title: title.to_string(),
            timestamp: DateTime::parse_from_rfc3339(timestamp).expect("ts"),
            description: String::new(),
            created_branch: None,
            created_tag: None,
            base_branch: base_branch.to_string(),
            merged_items: Vec::new(),
            notes: String::new(),
        }
    }

    fn titles(events: &[&WorkflowEvent]) -> Vec<String> {
        events.iter().map(|e| e.title.clone()).collect()
    }

    #[test]
    fn views_are_newest_first() {
        let indexes = EventIndexes::build(vec![
            event("early", "2024-03-01T08:00:00Z", "main"),
            event("late", "2024-03-01T18:00:00Z", "dev"),
            event("next day", "2024-03-02T07:00:00Z", "main"),
        ]);

        assert_eq!(
            titles(&select(&indexes, &HistoryView::All)),
            vec!["next day", "late", "early"]
        );
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
        assert_eq!(
            titles(&select(&indexes, &HistoryView::Date(date))),
            vec!["late", "early"]
        );
        assert_eq!(
            titles(&select(
                &indexes,
                &HistoryView::BaseBranch("main".to_string())
            )),
            vec!["next day", "early"]
        );
        assert!(select(&indexes, &HistoryView::BaseBranch("gone".to_string())).is_empty());
    }

    #[test]
    fn details_list_merged_items_with_tag_prefix() {
        let mut ev = event("Release", "2024-03-01T08:00:00Z", "main");
        ev.created_tag = Some("v1".to_string());
        ev.notes = "shipped".to_string();
        ev.merged_items.push(MergeItemResult {
            ref_display_name: "v0".to_string(),
            kind: RefKind::Tag,
            short_commit_id: "0123abcd".to_string(),
            commit_message: "prepare\n\nlong body".to_string(),
            commit_author: "Ann".to_string(),
            commit_timestamp: Some(ev.timestamp),
        });

        let text = render_details(&ev);
        assert!(text.contains("Created tag:    v1"));
        assert!(text.contains("  - tag: v0 @ 0123abcd by Ann on 2024-03-01 08:00:00"));
        assert!(text.contains("      prepare\n"));
        assert!(!text.contains("long body"));
        assert!(text.ends_with("Notes: shipped\n"));
    }

    #[test]
    fn summary_marks_empty_base_branch() {
        let ev = event("Old", "2023-12-31T09:00:00Z", "");
        assert_eq!(render_summary(&ev), "2023-12-31 09:00:00  Old  [base: -]");
    }
}
