//! Success archives: every discovered solution is persisted immediately.
//!
//! Each success gets a timestamp-named directory holding a structured dump
//! of the full frame chain (root to leaf) plus copies of the save-state
//! artifacts the chain references, so a solution remains replayable even
//! after the live save files are cleaned up.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use tracing::debug;

use crate::core::types::{StateFrame, walkthrough_key};

#[derive(Debug, Serialize)]
struct SolutionDump<'a> {
    found_at: String,
    elapsed_secs: f64,
    walkthrough: String,
    frames: &'a [StateFrame],
}

/// Archive one winning frame chain. Returns the archive directory.
pub fn record_success(
    successes_dir: &Path,
    frames: &[StateFrame],
    elapsed_secs: f64,
) -> Result<PathBuf> {
    let dir = unique_archive_dir(successes_dir)?;
    let walkthrough = walkthrough_key(
        frames
            .iter()
            .map(|f| f.command.as_str())
            .filter(|c| *c != crate::core::types::OPENING_COMMAND),
    );

    let dump = SolutionDump {
        found_at: Local::now().to_rfc3339(),
        elapsed_secs,
        walkthrough,
        frames,
    };
    let mut payload = serde_json::to_string_pretty(&dump).context("serialize solution")?;
    payload.push('\n');
    let solution_path = dir.join("solution.json");
    fs::write(&solution_path, payload)
        .with_context(|| format!("write {}", solution_path.display()))?;

    bundle_save_files(&dir, frames)?;
    debug!(dir = %dir.display(), "archived success");
    Ok(dir)
}

/// Timestamp-named directory; a counter suffix keeps two successes in the
/// same instant apart.
fn unique_archive_dir(successes_dir: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y-%m-%dT%H_%M_%S%.6f").to_string();
    let mut candidate = successes_dir.join(&stamp);
    let mut counter = 1u32;
    while candidate.exists() {
        candidate = successes_dir.join(format!("{stamp}-{counter}"));
        counter += 1;
    }
    fs::create_dir_all(&candidate)
        .with_context(|| format!("create archive directory {}", candidate.display()))?;
    Ok(candidate)
}

fn bundle_save_files(dir: &Path, frames: &[StateFrame]) -> Result<()> {
    let saves_dir = dir.join("saves");
    fs::create_dir_all(&saves_dir)
        .with_context(|| format!("create directory {}", saves_dir.display()))?;
    for frame in frames {
        let Some(source) = &frame.checkpoint else {
            continue;
        };
        if !source.exists() {
            continue;
        }
        let Some(name) = source.file_name() else {
            continue;
        };
        let destination = saves_dir.join(name);
        fs::copy(source, &destination).with_context(|| {
            format!(
                "copy save artifact {} to {}",
                source.display(),
                destination.display()
            )
        })?;
    }
    Ok(())
}
