//! Asynchronous, failure-tolerant checkpoint persistence.
//!
//! The search thread never blocks on disk: it hands deep-copy [`Snapshot`]s
//! to a dedicated writer thread over a bounded channel. Only the freshest
//! state matters for resumption, so the queue drops its oldest entry on
//! overflow. The write path never corrupts the canonical file: serialize to
//! a randomized temp file, rotate the previous checkpoint to a
//! one-generation `.bak`, then atomically rename into place.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use chrono::Local;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::core::counters::CounterSnapshot;
use crate::core::progress::StrandStats;

/// Deep copy of everything a resumed run needs, taken at enqueue time so
/// later mutation of the live store cannot touch an in-flight write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: String,
    pub counters: CounterSnapshot,
    pub strands: BTreeMap<String, StrandStats>,
}

impl Snapshot {
    pub fn new(counters: CounterSnapshot, strands: BTreeMap<String, StrandStats>) -> Self {
        Self {
            saved_at: Local::now().to_rfc3339(),
            counters,
            strands,
        }
    }
}

/// Where the canonical checkpoint and its backup live.
#[derive(Debug, Clone)]
pub struct CheckpointTarget {
    pub path: PathBuf,
    pub backup_path: PathBuf,
}

/// Handle to the background writer thread.
pub struct CheckpointWriter {
    tx: Sender<Snapshot>,
    /// Receiver clone used only to discard the oldest queued snapshot when
    /// the queue is full.
    overflow: Receiver<Snapshot>,
    handle: Option<JoinHandle<()>>,
}

impl CheckpointWriter {
    pub fn spawn(target: CheckpointTarget, queue_capacity: usize) -> Result<Self> {
        let (tx, rx) = bounded(queue_capacity.max(1));
        let overflow = rx.clone();
        let handle = thread::Builder::new()
            .name("checkpoint-writer".to_string())
            .spawn(move || writer_loop(&rx, &target))
            .context("spawn checkpoint writer thread")?;
        Ok(Self {
            tx,
            overflow,
            handle: Some(handle),
        })
    }

    /// Queue a snapshot for background persistence. Never blocks: when the
    /// queue is full the oldest queued snapshot is discarded to make room.
    pub fn enqueue(&self, snapshot: Snapshot) {
        let mut snapshot = snapshot;
        loop {
            match self.tx.try_send(snapshot) {
                Ok(()) => return,
                Err(TrySendError::Full(bounced)) => {
                    if self.overflow.try_recv().is_ok() {
                        debug!("discarded oldest queued checkpoint snapshot");
                    }
                    snapshot = bounced;
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!("checkpoint writer is gone; snapshot dropped");
                    return;
                }
            }
        }
    }

    /// Block until every queued snapshot has been written, then stop the
    /// writer thread.
    pub fn shutdown(mut self) {
        let handle = self.handle.take();
        // Dropping the only sender lets the writer drain the queue and exit.
        drop(self);
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("checkpoint writer thread panicked");
        }
    }
}

fn writer_loop(rx: &Receiver<Snapshot>, target: &CheckpointTarget) {
    while let Ok(snapshot) = rx.recv() {
        // Infrastructure failure is never fatal to the search; the next
        // cadence will retry with fresher state.
        if let Err(err) = write_snapshot(target, &snapshot) {
            error!("checkpoint write failed: {err:#}");
        } else {
            debug!(
                strands = snapshot.strands.len(),
                moves = snapshot.counters.moves,
                "checkpoint written"
            );
        }
    }
    debug!("checkpoint writer drained and stopped");
}

/// Durable write of one snapshot: temp file, `.bak` rotation, atomic rename.
/// On failure the temp file is kept beside the checkpoint for inspection.
pub fn write_snapshot(target: &CheckpointTarget, snapshot: &Snapshot) -> Result<()> {
    let dir = target.path.parent().with_context(|| {
        format!("checkpoint path missing parent {}", target.path.display())
    })?;
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;

    let mut payload = serde_json::to_string_pretty(snapshot).context("serialize checkpoint")?;
    payload.push('\n');

    let mut tmp = tempfile::Builder::new()
        .prefix("progress-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .context("create checkpoint temp file")?;
    if let Err(err) = tmp.write_all(payload.as_bytes()) {
        keep_for_inspection(tmp);
        return Err(err).context("write checkpoint temp file");
    }

    if target.path.exists()
        && let Err(err) = fs::rename(&target.path, &target.backup_path)
    {
        warn!(
            err = %err,
            backup = %target.backup_path.display(),
            "could not rotate previous checkpoint to backup"
        );
    }

    if let Err(err) = tmp.persist(&target.path) {
        keep_for_inspection(err.file);
        return Err(err.error)
            .with_context(|| format!("replace checkpoint {}", target.path.display()));
    }
    Ok(())
}

fn keep_for_inspection(tmp: tempfile::NamedTempFile) {
    match tmp.keep() {
        Ok((_, path)) => warn!(path = %path.display(), "left checkpoint temp file for inspection"),
        Err(err) => warn!(err = %err.error, "could not keep checkpoint temp file"),
    }
}

/// Read one snapshot file.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read checkpoint {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parse checkpoint {}", path.display()))
}

/// Load the freshest readable checkpoint: canonical first, then the backup.
/// Missing or corrupt files fall through with a warning; `None` means a cold
/// start.
pub fn load_latest(target: &CheckpointTarget) -> Option<Snapshot> {
    for path in [&target.path, &target.backup_path] {
        if !path.exists() {
            continue;
        }
        match load_snapshot(path) {
            Ok(snapshot) => {
                debug!(path = %path.display(), "loaded checkpoint");
                return Some(snapshot);
            }
            Err(err) => {
                warn!(path = %path.display(), "unreadable checkpoint, falling back: {err:#}");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(dir: &Path) -> CheckpointTarget {
        CheckpointTarget {
            path: dir.join("progress.json"),
            backup_path: dir.join("progress.json.bak"),
        }
    }

    fn snapshot(moves: u64) -> Snapshot {
        let mut strands = BTreeMap::new();
        strands.insert(
            "GO NORTH.".to_string(),
            StrandStats {
                moves,
                ..StrandStats::default()
            },
        );
        Snapshot {
            saved_at: format!("stamp-{moves}"),
            counters: CounterSnapshot {
                moves,
                ..CounterSnapshot::default()
            },
            strands,
        }
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = target(temp.path());
        let snap = snapshot(7);

        write_snapshot(&target, &snap).expect("write");
        let loaded = load_snapshot(&target.path).expect("load");
        assert_eq!(loaded, snap);
    }

    /// The previous checkpoint must survive as `.bak` after a rewrite, so a
    /// crash mid-write can never leave the run without a readable state.
    #[test]
    fn second_write_rotates_first_into_backup() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = target(temp.path());

        write_snapshot(&target, &snapshot(1)).expect("first write");
        write_snapshot(&target, &snapshot(2)).expect("second write");

        assert_eq!(load_snapshot(&target.path).expect("canonical").counters.moves, 2);
        assert_eq!(
            load_snapshot(&target.backup_path).expect("backup").counters.moves,
            1
        );
    }

    #[test]
    fn load_latest_falls_back_to_backup_when_canonical_is_corrupt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = target(temp.path());

        write_snapshot(&target, &snapshot(1)).expect("write");
        write_snapshot(&target, &snapshot(2)).expect("write");
        fs::write(&target.path, "{ not json").expect("corrupt canonical");

        let loaded = load_latest(&target).expect("backup should load");
        assert_eq!(loaded.counters.moves, 1);
    }

    #[test]
    fn load_latest_of_missing_files_is_a_cold_start() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_latest(&target(temp.path())).is_none());
    }

    #[test]
    fn writer_persists_the_freshest_enqueued_snapshot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target_paths = target(temp.path());
        let writer = CheckpointWriter::spawn(target_paths.clone(), 3).expect("spawn");

        for moves in 1..=5 {
            writer.enqueue(snapshot(moves));
        }
        writer.shutdown();

        let loaded = load_snapshot(&target_paths.path).expect("canonical");
        assert_eq!(loaded.counters.moves, 5);
    }
}
