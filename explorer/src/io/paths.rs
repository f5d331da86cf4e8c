//! Canonical layout of the working directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// All paths the explorer touches under one working directory.
#[derive(Debug, Clone)]
pub struct WorkPaths {
    pub root: PathBuf,
    /// Interpreter save files (one per checkpointed frame).
    pub saves_dir: PathBuf,
    /// Structured problem reports from the session controller.
    pub logs_dir: PathBuf,
    /// One archive per discovered success.
    pub successes_dir: PathBuf,
    /// Canonical progress checkpoint and its one-generation backup.
    pub checkpoint_path: PathBuf,
    pub checkpoint_backup_path: PathBuf,
    pub config_path: PathBuf,
}

impl WorkPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            saves_dir: root.join("saves"),
            logs_dir: root.join("logs"),
            successes_dir: root.join("successful_paths"),
            checkpoint_path: root.join("progress.json"),
            checkpoint_backup_path: root.join("progress.json.bak"),
            config_path: root.join("config.toml"),
            root,
        }
    }

    /// Create every directory, tolerating ones that already exist.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            &self.root,
            &self.saves_dir,
            &self.logs_dir,
            &self.successes_dir,
        ] {
            create_dir(dir)?;
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}
