//! Support library for the `kromo` binary.
//!
//! Exposes the command pipeline and logging setup so tests can drive the
//! commands in-process.

pub mod cli;
pub mod logging;
