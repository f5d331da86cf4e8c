//! Run configuration stored as `config.toml` in the working directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Tunables for one exploration run (TOML).
///
/// This file is meant to be edited by humans between runs. Missing fields
/// default to values that have survived multi-week runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Record an exhausted walkthrough prefix only at every this-many-th
    /// recursion level, to bound checkpoint volume.
    pub checkpoint_cadence: u32,

    /// Minimum seconds between pruning passes over the progress store.
    pub prune_interval_secs: u64,

    /// Strands of at most this many commands survive pruning unconditionally.
    pub retain_strand_len: usize,

    /// Most-recent snapshots retained in the checkpoint writer queue.
    pub snapshot_queue_capacity: usize,

    /// Print a progress line every this many complete paths.
    pub report_stride: u64,

    /// Capture a save checkpoint after every progressing turn.
    pub save_every_turn: bool,

    /// Re-read the inventory after every progressing turn.
    pub inventory_every_turn: bool,

    /// Ask the interpreter to keep a full game transcript.
    pub keep_transcript: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            checkpoint_cadence: 3,
            prune_interval_secs: 10 * 60,
            retain_strand_len: 4,
            snapshot_queue_capacity: 3,
            report_stride: 1000,
            save_every_turn: true,
            inventory_every_turn: true,
            keep_transcript: true,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_cadence == 0 {
            return Err(anyhow!("checkpoint_cadence must be > 0"));
        }
        if self.snapshot_queue_capacity == 0 {
            return Err(anyhow!("snapshot_queue_capacity must be > 0"));
        }
        if self.report_stride == 0 {
            return Err(anyhow!("report_stride must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file. A missing file means defaults.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    if !path.exists() {
        let cfg = RunConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RunConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RunConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = RunConfig {
            checkpoint_cadence: 5,
            retain_strand_len: 6,
            ..RunConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let cfg = RunConfig {
            checkpoint_cadence: 0,
            ..RunConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
