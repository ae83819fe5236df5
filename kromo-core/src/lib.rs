//! Kromo core library: graph storage, generators and greedy colouring.
//!
//! Everything here is synchronous and free of I/O. Parallel operations run on
//! dedicated Rayon pools sized by the caller.

pub mod coloring;
mod error;
pub mod generate;
mod graph;
#[cfg(test)]
pub(crate) mod test_utils;
mod workers;

pub use crate::{
    coloring::{ColoringBuilder, ColoringReport, ColoringStrategy, Colorer},
    error::{ColoringError, ColoringErrorCode, GraphError, GraphErrorCode, Result},
    graph::{Color, ColoringViolation, Graph, GraphInvariantViolation, Node},
    workers::partition,
};
