//! Workflow configuration stored under `<git-dir>/gitevent/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

/// What to do when a merge fails and nobody is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OnFailure {
    /// Ask the operator on the terminal (stop when stdin is not a terminal).
    Prompt,
    /// Abort the failed merge and continue with the next item.
    Skip,
    /// Abort the failed merge and stop the merge step.
    Stop,
}

/// Workflow configuration (TOML).
///
/// Missing fields default, so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Remote used for fetch, push and remote branch names.
    pub remote: String,

    /// Root of the event store. Relative paths are taken from the repository
    /// root; unset means `<git-dir>/gitevent/events`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,

    /// `chrono` format for the date token of preset names.
    pub date_format: String,

    /// Fetch branches and tags on every cache refresh.
    pub fetch: bool,

    /// Preset prefixes offered for new branches and tags.
    pub branch_prefixes: Vec<String>,

    pub default_on_failure: OnFailure,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            storage_path: None,
            date_format: "%Y.%m.%d".to_string(),
            fetch: true,
            branch_prefixes: ["feature", "bugfix", "hotfix", "release"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            default_on_failure: OnFailure::Prompt,
        }
    }
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.remote.trim().is_empty() {
            return Err(anyhow!("remote must be non-empty"));
        }
        if self.date_format.trim().is_empty() {
            return Err(anyhow!("date_format must be non-empty"));
        }
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(anyhow!("date_format is not a valid strftime format"));
        }
        if self.branch_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(anyhow!("branch_prefixes must not contain empty entries"));
        }
        Ok(())
    }

    /// Event store root, given the repository root and state directory.
    pub fn storage_root(&self, repo_root: &Path, state_dir: &Path) -> PathBuf {
        match &self.storage_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => repo_root.join(path),
            None => state_dir.join("events"),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WorkflowConfig::default()`.
pub fn load_config(path: &Path) -> Result<WorkflowConfig> {
    if !path.exists() {
        let cfg = WorkflowConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WorkflowConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WorkflowConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, WorkflowConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = WorkflowConfig {
            remote: "upstream".to_string(),
            storage_path: Some(PathBuf::from("/var/events")),
            default_on_failure: OnFailure::Skip,
            ..WorkflowConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "fetch = false\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(!cfg.fetch);
        assert_eq!(cfg.remote, "origin");
    }

    #[test]
    fn empty_remote_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "remote = \"\"\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("remote must be non-empty"));
    }

    #[test]
    fn invalid_date_format_is_rejected() {
        let cfg = WorkflowConfig {
            date_format: "%Y.%".to_string(),
            ..WorkflowConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("date_format"));
    }

    #[test]
    fn storage_root_resolves_relative_to_repo() {
        let cfg = WorkflowConfig {
            storage_path: Some(PathBuf::from("records")),
            ..WorkflowConfig::default()
        };
        let root = cfg.storage_root(Path::new("/repo"), Path::new("/repo/.git/gitevent"));
        assert_eq!(root, PathBuf::from("/repo/records"));

        let default_root =
            WorkflowConfig::default().storage_root(Path::new("/repo"), Path::new("/state"));
        assert_eq!(default_root, PathBuf::from("/state/events"));
    }
}
