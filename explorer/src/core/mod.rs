//! Pure, deterministic search logic: legality rules, progress bookkeeping,
//! counters, and the shared frame types. No I/O lives here.

pub mod counters;
pub mod progress;
pub mod rules;
pub mod types;
