//! The recursive backtracking search engine.
//!
//! One thread walks the whole move tree: for every admissible command it
//! executes the move through the session controller, classifies the result,
//! and either dead-ends, archives a success, or recurses. Backtracking is
//! save/restore based: one checkpoint artifact per backtracking point,
//! reused for every sibling trial, because repeated saves are far cheaper
//! than replaying command sequences. Exhausted walkthrough prefixes are
//! recorded to the progress store (cadence-gated) and handed to the
//! checkpoint writer so an interrupted run can resume without re-exploring.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, trace, warn};

use crate::control::{RunControl, progress_line};
use crate::core::counters::RunCounters;
use crate::core::progress::ProgressStore;
use crate::core::rules::RuleTable;
use crate::core::types::Outcome;
use crate::io::archive::record_success;
use crate::io::checkpoint::{CheckpointWriter, Snapshot};
use crate::io::session::Session;

/// Engine knobs, usually derived from [`crate::io::config::RunConfig`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Record an exhausted prefix only at recursion depths divisible by
    /// this, to bound checkpoint volume.
    pub checkpoint_cadence: u32,
    /// Minimum interval between pruning passes over the progress store.
    pub prune_interval: Duration,
    /// Print a progress line every this many complete paths.
    pub report_stride: u64,
    /// Pause after a signal-requested progress report, so it can be read.
    pub progress_pause: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            checkpoint_cadence: 3,
            prune_interval: Duration::from_secs(10 * 60),
            report_stride: 1000,
            progress_pause: Duration::from_secs(2),
        }
    }
}

impl SearchOptions {
    pub fn from_config(cfg: &crate::io::config::RunConfig) -> Self {
        Self {
            checkpoint_cadence: cfg.checkpoint_cadence,
            prune_interval: Duration::from_secs(cfg.prune_interval_secs),
            report_stride: cfg.report_stride,
            ..Self::default()
        }
    }
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every legal command sequence has been explored.
    Exhausted,
    /// A graceful shutdown was requested between moves.
    Interrupted,
}

/// Final accounting for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSummary {
    pub stop: StopReason,
    pub moves: u64,
    pub dead_ends: u64,
    pub successes: u64,
    pub max_walkthrough_len: u64,
    pub elapsed: Duration,
}

/// The search engine, generic over the interpreter backend.
pub struct Explorer<S: Session> {
    session: S,
    rules: RuleTable,
    progress: ProgressStore,
    counters: Arc<RunCounters>,
    writer: CheckpointWriter,
    control: RunControl,
    options: SearchOptions,
    successes_dir: PathBuf,
    last_prune: Instant,
    last_reported: u64,
}

impl<S: Session> Explorer<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: S,
        rules: RuleTable,
        progress: ProgressStore,
        counters: Arc<RunCounters>,
        writer: CheckpointWriter,
        control: RunControl,
        options: SearchOptions,
        successes_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            session,
            rules,
            progress,
            counters,
            writer,
            control,
            options,
            successes_dir: successes_dir.into(),
            last_prune: Instant::now(),
            last_reported: 0,
        }
    }

    /// Drive the search to exhaustion (or graceful interruption), flush the
    /// final checkpoint, and end the session. Returns the summary and the
    /// session for inspection.
    pub fn run(mut self) -> Result<(SearchSummary, S)> {
        info!(
            rules = self.rules.len(),
            known_strands = self.progress.len(),
            "beginning exploration"
        );
        self.explore(0)?;

        let stop = if self.control.shutdown_requested() {
            StopReason::Interrupted
        } else {
            StopReason::Exhausted
        };
        self.flush_checkpoint();
        self.session.end().context("end interpreter session")?;

        let summary = SearchSummary {
            stop,
            moves: self.counters.moves(),
            dead_ends: self.counters.dead_ends(),
            successes: self.counters.successes(),
            max_walkthrough_len: self.counters.max_walkthrough_len(),
            elapsed: self.counters.elapsed(),
        };
        info!(?summary.stop, "exploration finished: {}", progress_line(&self.counters));

        let Explorer {
            writer, session, ..
        } = self;
        // Blocks until the queue is drained, so the freshest state is on disk.
        writer.shutdown();
        Ok((summary, session))
    }

    /// Explore every continuation of the current state. On return the
    /// session is back in exactly the state it was called in.
    fn explore(&mut self, depth: u32) -> Result<()> {
        let key = self.session.text_walkthrough();
        // Resumption fast-path: this subtree was fully exhausted by a
        // previous run, either recorded outright or covered by a shorter
        // recorded prefix.
        if self.progress.contains(&key) || self.progress.is_redundant(&key) {
            trace!(%key, "skipping exhausted strand");
            return Ok(());
        }

        // One checkpoint per backtracking point, shared by all siblings.
        let restore_point = match self.session.current_checkpoint() {
            Some(checkpoint) => checkpoint,
            None => self.session.save_state()?,
        };

        for index in 0..self.rules.len() {
            // Cancellation only takes effect between moves; an in-flight
            // interpreter exchange always finishes.
            if self.control.shutdown_requested() {
                break;
            }
            if self.control.take_progress_pause() {
                info!("{}", progress_line(&self.counters));
                thread::sleep(self.options.progress_pause);
            }

            let command = {
                let view = self.session.view();
                let rule = self.rules.rule(index);
                if !rule.admissible(&view, self.rules.world()) {
                    continue;
                }
                rule.command().to_string()
            };
            trace!(room = self.session.view().room, %command, depth, "trying");

            // Any error out of the controller leaves the subprocess in a
            // state of unknown integrity; it propagates and ends the run.
            let frame = self
                .session
                .make_single_move(&command)
                .with_context(|| format!("executing {command:?} after walkthrough {key:?}"))?;
            self.counters.record_move();

            match frame.outcome {
                Outcome::Mistake | Outcome::Failed => {
                    self.counters.record_dead_end();
                    trace!(%command, outcome = ?frame.outcome, "dead end");
                }
                Outcome::Success => {
                    self.counters.record_success();
                    let walkthrough = self.session.text_walkthrough();
                    println!(
                        "SUCCESS #{}: {walkthrough}",
                        self.counters.successes()
                    );
                    // Archiving is infrastructure: log and keep searching.
                    if let Err(err) = record_success(
                        &self.successes_dir,
                        self.session.frames(),
                        self.counters.elapsed().as_secs_f64(),
                    ) {
                        warn!("could not archive success: {err:#}");
                    }
                }
                Outcome::Progress => {
                    self.counters
                        .note_walkthrough_len(self.session.view().command_count() as u64);
                    self.explore(depth + 1)?;
                }
            }

            self.session
                .restore_to(&restore_point)
                .with_context(|| format!("restoring state after {command:?}"))?;
            self.session.drop_last_frame();
            self.maybe_report();
        }

        // An interrupted loop has not exhausted this prefix (the shutdown
        // may have landed anywhere below us); recording it would poison
        // every future resume.
        if !self.control.shutdown_requested() && depth % self.options.checkpoint_cadence == 0 {
            self.progress.record(key, self.counters.strand_stats());
            self.maybe_prune();
            self.writer.enqueue(Snapshot::new(
                self.counters.snapshot(),
                self.progress.strands().clone(),
            ));
        }
        Ok(())
    }

    fn flush_checkpoint(&mut self) {
        self.progress.prune();
        self.writer.enqueue(Snapshot::new(
            self.counters.snapshot(),
            self.progress.strands().clone(),
        ));
    }

    /// Pruning before a checkpoint write, gated so a hot subtree cannot
    /// trigger quadratic prune costs on every exhausted branch.
    fn maybe_prune(&mut self) {
        if self.last_prune.elapsed() < self.options.prune_interval {
            return;
        }
        self.last_prune = Instant::now();
        let removed = self.progress.prune();
        if removed > 0 {
            debug!(removed, remaining = self.progress.len(), "pruned redundant strands");
        }
    }

    fn maybe_report(&mut self) {
        let complete = self.counters.complete_paths();
        if complete != self.last_reported && complete % self.options.report_stride == 0 {
            self.last_reported = complete;
            info!("explored {complete} complete paths so far ({})", progress_line(&self.counters));
        }
    }
}
