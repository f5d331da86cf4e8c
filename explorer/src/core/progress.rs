//! Progress store: which walkthrough prefixes have been fully exhausted.
//!
//! The store is what lets a multi-week run survive interruption: a stored
//! key guarantees that every continuation of that prefix has already been
//! explored, so the search can skip the whole subtree on resume. Longer
//! keys made obsolete by a shorter recorded prefix are pruned, except that
//! short strands (at most [`ProgressStore::retain_len`] commands) are kept
//! unconditionally as an audit trail.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{is_strict_key_prefix, key_elements};

/// Statistics recorded for a fully exhausted walkthrough prefix, as of the
/// moment the prefix was checkpointed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrandStats {
    pub dead_ends: u64,
    pub successes: u64,
    pub moves: u64,
    pub elapsed_secs: f64,
    pub max_depth: u64,
}

impl StrandStats {
    /// Field-wise maximum, used to reconstruct counters on resume.
    pub fn max(self, other: StrandStats) -> StrandStats {
        StrandStats {
            dead_ends: self.dead_ends.max(other.dead_ends),
            successes: self.successes.max(other.successes),
            moves: self.moves.max(other.moves),
            elapsed_secs: self.elapsed_secs.max(other.elapsed_secs),
            max_depth: self.max_depth.max(other.max_depth),
        }
    }
}

/// Mapping from walkthrough key to the statistics current when that prefix
/// was recorded as fully exhausted.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    strands: BTreeMap<String, StrandStats>,
    /// Strands of at most this many commands survive pruning unconditionally.
    retain_len: usize,
}

impl ProgressStore {
    pub fn new(retain_len: usize) -> Self {
        Self {
            strands: BTreeMap::new(),
            retain_len,
        }
    }

    /// Rebuild a store from checkpointed strands.
    pub fn from_strands(strands: BTreeMap<String, StrandStats>, retain_len: usize) -> Self {
        Self { strands, retain_len }
    }

    pub fn len(&self) -> usize {
        self.strands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strands.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.strands.contains_key(key)
    }

    /// Borrow the strand table, e.g. to deep-copy it into a snapshot.
    pub fn strands(&self) -> &BTreeMap<String, StrandStats> {
        &self.strands
    }

    /// True iff some stored key is a strict prefix of `key` on a command
    /// boundary. An exact match does not count: the key itself being
    /// recorded says nothing about whether a *shorter* record obviates it.
    pub fn is_redundant(&self, key: &str) -> bool {
        self.strands
            .keys()
            .any(|stored| is_strict_key_prefix(stored, key))
    }

    /// Record `key` as a fully exhausted prefix.
    pub fn record(&mut self, key: impl Into<String>, stats: StrandStats) {
        self.strands.insert(key.into(), stats);
    }

    /// Drop every strand made redundant by a shorter recorded prefix,
    /// keeping strands of at most `retain_len` commands regardless.
    /// Returns how many entries were removed.
    pub fn prune(&mut self) -> usize {
        let doomed: Vec<String> = self
            .strands
            .keys()
            .filter(|key| key_elements(key) > self.retain_len && self.is_redundant(key))
            .cloned()
            .collect();
        for key in &doomed {
            self.strands.remove(key);
        }
        doomed.len()
    }

    /// Field-wise maxima across all strands, for counter reconstruction on
    /// resume. `None` when the store is empty.
    pub fn resume_maxima(&self) -> Option<StrandStats> {
        self.strands
            .values()
            .copied()
            .reduce(StrandStats::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(moves: u64) -> StrandStats {
        StrandStats {
            moves,
            ..StrandStats::default()
        }
    }

    fn long_key(n: usize) -> String {
        let commands: Vec<String> = (0..n).map(|i| format!("CMD{i}")).collect();
        commands.join(". ") + "."
    }

    #[test]
    fn redundancy_needs_a_strictly_shorter_prefix() {
        let mut store = ProgressStore::new(4);
        store.record("GO NORTH. WAIT.", stats(10));

        assert!(store.is_redundant("GO NORTH. WAIT. GO SOUTH."));
        assert!(!store.is_redundant("GO NORTH. WAIT."));
        assert!(!store.is_redundant("GO NORTH."));
        assert!(!store.is_redundant("GO NORTHWEST. WAIT."));
    }

    /// For all stored K1, K2 with K1 a strict prefix of K2, pruning removes
    /// K2 unless K2 is within the retention length.
    #[test]
    fn prune_removes_every_redundant_long_strand() {
        let mut store = ProgressStore::new(4);
        store.record(long_key(3), stats(1));
        store.record(long_key(5), stats(2));
        store.record(long_key(6), stats(3));
        store.record(long_key(9), stats(4));
        // Unrelated strand must survive.
        store.record("WAIT. WAIT. WAIT. WAIT. WAIT.", stats(5));

        let removed = store.prune();

        assert_eq!(removed, 3);
        assert!(store.contains(&long_key(3)));
        assert!(!store.contains(&long_key(5)));
        assert!(!store.contains(&long_key(6)));
        assert!(!store.contains(&long_key(9)));
        assert!(store.contains("WAIT. WAIT. WAIT. WAIT. WAIT."));
    }

    #[test]
    fn prune_retains_short_strands_even_when_redundant() {
        let mut store = ProgressStore::new(4);
        store.record(long_key(2), stats(1));
        store.record(long_key(4), stats(2));

        let removed = store.prune();

        assert_eq!(removed, 0);
        assert!(store.contains(&long_key(4)));
    }

    #[test]
    fn retention_length_is_configurable() {
        let mut store = ProgressStore::new(1);
        store.record(long_key(1), stats(1));
        store.record(long_key(2), stats(2));

        assert_eq!(store.prune(), 1);
        assert!(store.contains(&long_key(1)));
        assert!(!store.contains(&long_key(2)));
    }

    #[test]
    fn resume_maxima_takes_each_field_independently() {
        let mut store = ProgressStore::new(4);
        store.record(
            "A.",
            StrandStats {
                dead_ends: 10,
                successes: 1,
                moves: 50,
                elapsed_secs: 3.0,
                max_depth: 7,
            },
        );
        store.record(
            "B.",
            StrandStats {
                dead_ends: 4,
                successes: 2,
                moves: 80,
                elapsed_secs: 9.5,
                max_depth: 5,
            },
        );

        let maxima = store.resume_maxima().expect("non-empty store");
        assert_eq!(maxima.dead_ends, 10);
        assert_eq!(maxima.successes, 2);
        assert_eq!(maxima.moves, 80);
        assert_eq!(maxima.elapsed_secs, 9.5);
        assert_eq!(maxima.max_depth, 7);
    }

    #[test]
    fn resume_maxima_of_empty_store_is_none() {
        assert!(ProgressStore::new(4).resume_maxima().is_none());
    }
}
