//! Process-wide run counters, shared across threads.
//!
//! One explicit struct instead of scattered globals: the search thread
//! updates it on every move, the signal thread reads it for status reports,
//! and the checkpoint writer serializes a [`CounterSnapshot`] of it into
//! every checkpoint. Elapsed time from previous runs is banked so reporting
//! stays continuous across restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::progress::StrandStats;

/// Serializable image of the counters at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub moves: u64,
    pub dead_ends: u64,
    pub successes: u64,
    pub max_walkthrough_len: u64,
    pub elapsed_secs: f64,
}

impl CounterSnapshot {
    /// Reconcile with per-strand maxima from a resumed progress store. The
    /// snapshot is normally the fresher record; the maxima guard against a
    /// checkpoint whose counter block is older than its strand table.
    pub fn reconciled(self, maxima: Option<StrandStats>) -> CounterSnapshot {
        let Some(m) = maxima else { return self };
        CounterSnapshot {
            moves: self.moves.max(m.moves),
            dead_ends: self.dead_ends.max(m.dead_ends),
            successes: self.successes.max(m.successes),
            max_walkthrough_len: self.max_walkthrough_len.max(m.max_depth),
            elapsed_secs: self.elapsed_secs.max(m.elapsed_secs),
        }
    }
}

/// Live counters for the current run.
#[derive(Debug)]
pub struct RunCounters {
    moves: AtomicU64,
    dead_ends: AtomicU64,
    successes: AtomicU64,
    max_walkthrough_len: AtomicU64,
    banked: Duration,
    started: Instant,
}

impl RunCounters {
    /// Fresh counters for a cold start.
    pub fn new() -> Self {
        Self::resumed(CounterSnapshot::default())
    }

    /// Counters primed from a (reconciled) checkpoint snapshot. The run
    /// start is back-dated by the banked elapsed time.
    pub fn resumed(snapshot: CounterSnapshot) -> Self {
        // A checkpoint written by hand could carry a nonsense elapsed value.
        let banked_secs = if snapshot.elapsed_secs.is_finite() {
            snapshot.elapsed_secs.max(0.0)
        } else {
            0.0
        };
        Self {
            moves: AtomicU64::new(snapshot.moves),
            dead_ends: AtomicU64::new(snapshot.dead_ends),
            successes: AtomicU64::new(snapshot.successes),
            max_walkthrough_len: AtomicU64::new(snapshot.max_walkthrough_len),
            banked: Duration::from_secs_f64(banked_secs),
            started: Instant::now(),
        }
    }

    pub fn record_move(&self) {
        self.moves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_end(&self) {
        self.dead_ends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_walkthrough_len(&self, len: u64) {
        self.max_walkthrough_len.fetch_max(len, Ordering::Relaxed);
    }

    pub fn moves(&self) -> u64 {
        self.moves.load(Ordering::Relaxed)
    }

    pub fn dead_ends(&self) -> u64 {
        self.dead_ends.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn max_walkthrough_len(&self) -> u64 {
        self.max_walkthrough_len.load(Ordering::Relaxed)
    }

    /// Complete paths explored: every branch ends as a dead end or success.
    pub fn complete_paths(&self) -> u64 {
        self.dead_ends() + self.successes()
    }

    /// Wall time including banked time from previous runs.
    pub fn elapsed(&self) -> Duration {
        self.banked + self.started.elapsed()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            moves: self.moves(),
            dead_ends: self.dead_ends(),
            successes: self.successes(),
            max_walkthrough_len: self.max_walkthrough_len(),
            elapsed_secs: self.elapsed().as_secs_f64(),
        }
    }

    /// The statistics recorded alongside an exhausted-prefix entry.
    pub fn strand_stats(&self) -> StrandStats {
        StrandStats {
            dead_ends: self.dead_ends(),
            successes: self.successes(),
            moves: self.moves(),
            elapsed_secs: self.elapsed().as_secs_f64(),
            max_depth: self.max_walkthrough_len(),
        }
    }
}

impl Default for RunCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_snapshot() {
        let counters = RunCounters::new();
        counters.record_move();
        counters.record_move();
        counters.record_dead_end();
        counters.record_success();
        counters.note_walkthrough_len(3);
        counters.note_walkthrough_len(2);

        let snap = counters.snapshot();
        assert_eq!(snap.moves, 2);
        assert_eq!(snap.dead_ends, 1);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.max_walkthrough_len, 3);
        assert_eq!(counters.complete_paths(), 2);
    }

    #[test]
    fn resume_banks_elapsed_time() {
        let snapshot = CounterSnapshot {
            moves: 100,
            dead_ends: 40,
            successes: 2,
            max_walkthrough_len: 12,
            elapsed_secs: 3600.0,
        };
        let counters = RunCounters::resumed(snapshot);
        assert_eq!(counters.moves(), 100);
        assert!(counters.elapsed() >= Duration::from_secs(3600));
    }

    #[test]
    fn reconciliation_takes_field_wise_maxima() {
        let snapshot = CounterSnapshot {
            moves: 100,
            dead_ends: 40,
            successes: 2,
            max_walkthrough_len: 12,
            elapsed_secs: 50.0,
        };
        let maxima = StrandStats {
            dead_ends: 55,
            successes: 1,
            moves: 90,
            elapsed_secs: 80.0,
            max_depth: 20,
        };
        let merged = snapshot.reconciled(Some(maxima));
        assert_eq!(merged.moves, 100);
        assert_eq!(merged.dead_ends, 55);
        assert_eq!(merged.successes, 2);
        assert_eq!(merged.max_walkthrough_len, 20);
        assert_eq!(merged.elapsed_secs, 80.0);
    }
}
