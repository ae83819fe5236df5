//! Benchmark support crate for kromo.
//!
//! Holds the parameter types, setup errors and graph fixtures shared by the
//! Criterion benchmarks for graph generation and colouring.

pub mod error;
pub mod fixtures;
pub mod params;
