//! Tracing setup with runtime-adjustable verbosity.
//!
//! Output goes to stderr in compact format. `RUST_LOG` wins as the initial
//! filter when set; otherwise the CLI's `-v`/`-q` delta picks a rung on the
//! level ladder. Signal handlers cycle the ladder at runtime through the
//! reload handle, so a multi-week run can be made chattier without a
//! restart.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// The verbosity ladder, least to most chatty.
pub const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Ladder index used when no delta and no `RUST_LOG` are given.
const DEFAULT_INDEX: usize = 2; // info

/// Runtime handle for cycling verbosity.
pub struct Verbosity {
    handle: reload::Handle<EnvFilter, Registry>,
    index: AtomicUsize,
}

impl Verbosity {
    pub fn level_name(&self) -> &'static str {
        LEVELS[self.index.load(Ordering::Relaxed)]
    }

    /// One rung chattier. Returns the level now in effect.
    pub fn increase(&self) -> &'static str {
        self.shift(1)
    }

    /// One rung quieter. Returns the level now in effect.
    pub fn decrease(&self) -> &'static str {
        self.shift(-1)
    }

    fn shift(&self, delta: i32) -> &'static str {
        let current = self.index.load(Ordering::Relaxed);
        let next = shifted_index(current, delta);
        self.index.store(next, Ordering::Relaxed);
        let name = LEVELS[next];
        // Reload only fails once the subscriber is torn down at exit.
        let _ = self.handle.reload(EnvFilter::new(name));
        name
    }
}

/// Clamp a ladder shift to the available rungs.
fn shifted_index(index: usize, delta: i32) -> usize {
    let raw = index as i32 + delta;
    raw.clamp(0, LEVELS.len() as i32 - 1) as usize
}

/// Install the global subscriber. `delta` comes from the CLI's counted
/// `-v`/`-q` flags.
pub fn init(delta: i32) -> Verbosity {
    let index = shifted_index(DEFAULT_INDEX, delta);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LEVELS[index]));
    let (filter_layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();

    Verbosity {
        handle,
        index: AtomicUsize::new(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_clamp_to_the_ladder() {
        assert_eq!(shifted_index(2, 1), 3);
        assert_eq!(shifted_index(2, -1), 1);
        assert_eq!(shifted_index(4, 3), 4);
        assert_eq!(shifted_index(0, -2), 0);
        assert_eq!(shifted_index(2, -10), 0);
    }
}
