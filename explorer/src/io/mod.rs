//! Side-effecting operations: the interpreter subprocess, checkpoint
//! persistence, success archives, and on-disk configuration.

pub mod archive;
pub mod checkpoint;
pub mod config;
pub mod paths;
pub mod session;
pub mod terp;
