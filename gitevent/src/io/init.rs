//! State directory layout under the repository's git dir.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use super::config::{WorkflowConfig, write_config};

/// All canonical paths within `<git-dir>/gitevent/`.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub run_state_path: PathBuf,
}

impl StatePaths {
    pub fn new(git_dir: &Path) -> Self {
        let state_dir = git_dir.join("gitevent");
        Self {
            config_path: state_dir.join("config.toml"),
            run_state_path: state_dir.join("run_state.json"),
            state_dir,
        }
    }
}

/// Options for `init_state`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config.
    pub force: bool,
}

/// Write the default config into the state directory.
///
/// Fails if a config already exists unless `options.force` is set.
pub fn init_state(paths: &StatePaths, options: &InitOptions) -> Result<()> {
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "gitevent init: {} already exists (use --force to overwrite)",
            paths.config_path.display()
        ));
    }
    write_config(&paths.config_path, &WorkflowConfig::default())
}
