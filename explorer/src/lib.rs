//! Exhaustive possibility-space explorer for parser interactive fiction.
//!
//! This crate plays a tightly constrained puzzle game through an external
//! interpreter subprocess and enumerates every distinct command sequence
//! that reaches a winning state, surviving multi-week unattended runs
//! through incremental checkpointing. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (legality rules, the
//!   redundancy/progress store, run counters, frame types). No I/O, fully
//!   testable in isolation.
//! - **[`io`]**: Side-effecting operations (the interpreter subprocess,
//!   checkpoint persistence, success archives, configuration).
//!
//! Orchestration modules ([`search`], [`control`], [`logging`]) coordinate
//! core logic with I/O; [`atd`] carries the game-specific data tables.

pub mod atd;
pub mod control;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod search;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
