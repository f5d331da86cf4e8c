//! Asynchronous runtime control: OS signals adjust a running exploration
//! without restarting it.
//!
//! SIGUSR1/SIGUSR2 cycle verbosity up and down, SIGHUP prints a progress
//! report (and asks the search to pause briefly so it can be read), and
//! SIGINT/SIGTERM request a graceful shutdown. The search engine polls the
//! flags between moves; an in-flight interpreter exchange always finishes
//! first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::Signals;
use tracing::debug;

use crate::core::counters::RunCounters;
use crate::logging::Verbosity;

/// Flags shared between the signal thread and the search engine.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    shutdown: Arc<AtomicBool>,
    progress: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn request_progress_pause(&self) {
        self.progress.store(true, Ordering::Relaxed);
    }

    /// True at most once per request: reading clears the flag.
    pub fn take_progress_pause(&self) -> bool {
        self.progress.swap(false, Ordering::Relaxed)
    }
}

/// One-line run summary for progress reports.
pub fn progress_line(counters: &RunCounters) -> String {
    let hours = counters.elapsed().as_secs_f64() / 3600.0;
    format!(
        "{} moves, {} dead ends, {} successes, longest walkthrough {}, {:.3} hours elapsed",
        counters.moves(),
        counters.dead_ends(),
        counters.successes(),
        counters.max_walkthrough_len(),
        hours,
    )
}

/// Spawn the signal-handling thread. It lives for the rest of the process.
pub fn install_signal_handlers(
    control: RunControl,
    verbosity: Arc<Verbosity>,
    counters: Arc<RunCounters>,
) -> Result<()> {
    let mut signals = Signals::new([SIGUSR1, SIGUSR2, SIGHUP, SIGINT, SIGTERM])
        .context("register signal handlers")?;
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGUSR1 => {
                        let level = verbosity.increase();
                        println!("\nVerbosity increased to {level}");
                    }
                    SIGUSR2 => {
                        let level = verbosity.decrease();
                        println!("\nVerbosity decreased to {level}");
                    }
                    SIGHUP => {
                        println!("\nCurrent status: {}", progress_line(&counters));
                        control.request_progress_pause();
                    }
                    SIGINT | SIGTERM => {
                        println!("\nShutdown requested; finishing the current move ...");
                        control.request_shutdown();
                    }
                    other => debug!(signal = other, "ignoring signal"),
                }
            }
        })
        .context("spawn signal thread")?;
    Ok(())
}
