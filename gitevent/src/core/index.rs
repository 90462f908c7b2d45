//! Date and base-branch indexes over loaded events.
//!
//! Indexes are derived data: they are rebuilt from the full event list on every
//! load and never written to disk. Buckets keep load order; sorting for display
//! is left to the consumer.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::core::types::WorkflowEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventIndexes {
    events: Vec<WorkflowEvent>,
    by_date: BTreeMap<NaiveDate, Vec<usize>>,
    by_base_branch: BTreeMap<String, Vec<usize>>,
}

impl EventIndexes {
    pub fn build(events: Vec<WorkflowEvent>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        let mut by_base_branch: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, event) in events.iter().enumerate() {
            by_date.entry(event.date()).or_default().push(idx);
            by_base_branch
                .entry(event.base_branch.clone())
                .or_default()
                .push(idx);
        }
        Self {
            events,
            by_date,
            by_base_branch,
        }
    }

    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn by_date(&self, date: NaiveDate) -> Vec<&WorkflowEvent> {
        self.bucket(self.by_date.get(&date))
    }

    pub fn by_base_branch(&self, branch: &str) -> Vec<&WorkflowEvent> {
        self.bucket(self.by_base_branch.get(branch))
    }

    /// Dates that have at least one event, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }

    pub fn base_branches(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_base_branch.keys().map(String::as_str)
    }

    fn bucket(&self, indices: Option<&Vec<usize>>) -> Vec<&WorkflowEvent> {
        indices
            .map(|ids| ids.iter().map(|&idx| &self.events[idx]).collect())
            .unwrap_or_default()
    }
}
