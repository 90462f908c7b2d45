//! Run draft storage between `gitevent run` and `gitevent save`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::types::RunDraft;

/// Load the pending draft, if one was recorded.
pub fn load_run_state(path: &Path) -> Result<Option<RunDraft>> {
    if !path.exists() {
        return Ok(None);
    }
    debug!(path = %path.display(), "loading run state");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run state {}", path.display()))?;
    let draft: RunDraft = serde_json::from_str(&contents)
        .with_context(|| format!("parse run state {}", path.display()))?;
    debug!(base_branch = %draft.base_branch, merged = draft.merged_items.len(), "run state loaded");
    Ok(Some(draft))
}

/// Atomically write the draft, or remove the file when there is none.
pub fn write_run_state(path: &Path, draft: Option<&RunDraft>) -> Result<()> {
    let Some(draft) = draft else {
        debug!(path = %path.display(), "clearing run state");
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("remove run state {}", path.display()))?;
        }
        return Ok(());
    };
    debug!(path = %path.display(), base_branch = %draft.base_branch, "writing run state");
    let mut buf = serde_json::to_string_pretty(draft)?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
