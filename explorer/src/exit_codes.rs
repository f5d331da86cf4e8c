//! Stable exit codes for the explorer binary.

/// Graceful shutdown, including a signal-driven interruption.
pub const OK: i32 = 0;
/// Unrecoverable error during the search, after diagnostics were printed.
pub const FATAL: i32 = 1;
