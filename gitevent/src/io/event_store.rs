//! Append-only event store on the local filesystem.
//!
//! Layout: `<root>/<YYYY-MM-DD>/<HHMMSS>_<branch>.json`, one event per file.
//! Loading always rescans the whole tree and rebuilds the indexes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::core::index::EventIndexes;
use crate::core::path::{EVENT_EXTENSION, event_path};
use crate::core::types::WorkflowEvent;
use crate::error::WorkflowError;

/// Result of a full load: indexes plus per-file problems that were skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub indexes: EventIndexes,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EventStore {
    root: PathBuf,
}

impl EventStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `event` and return the file it was written to.
    ///
    /// A second save for the same branch within the same second replaces the
    /// first.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn append(&self, event: &WorkflowEvent) -> Result<PathBuf> {
        let path = event_path(&self.root, event);
        write_event(&path, event)
            .map_err(|err| WorkflowError::persistence("append", &path, &err))?;
        info!(path = %path.display(), title = %event.title, "event saved");
        Ok(path)
    }

    /// Scan every event file under the root and rebuild both indexes.
    ///
    /// Files that fail to read or parse are reported in
    /// [`LoadReport::errors`] and skipped. A missing root is an empty store.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn load_all(&self) -> Result<LoadReport> {
        if !self.root.exists() {
            debug!("storage root missing, no events");
            return Ok(LoadReport::default());
        }

        let mut events = Vec::new();
        let mut errors = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(err = %err, "skipping unreadable entry");
                    errors.push(format!("scan: {err}"));
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_event_file(entry.path()) {
                continue;
            }
            match read_event(entry.path()) {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(path = %entry.path().display(), err = %format!("{err:#}"), "skipping event file");
                    errors.push(format!("{}: {err:#}", entry.path().display()));
                }
            }
        }

        debug!(loaded = events.len(), skipped = errors.len(), "events loaded");
        Ok(LoadReport {
            indexes: EventIndexes::build(events),
            errors,
        })
    }
}

fn is_event_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(EVENT_EXTENSION)
}

fn write_event(path: &Path, event: &WorkflowEvent) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(event).context("serialize event")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

fn read_event(path: &Path) -> Result<WorkflowEvent> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
