//! Benchmark parameter types.
//!
//! Each type renders as the Criterion parameter label, so report directories
//! read as `n=1000,w=4`.

use std::fmt;

/// Parameters for a graph construction benchmark.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GenerationBenchParams {
    /// Nodes in the generated graph.
    pub node_count: usize,
    /// Worker threads for the parallel variant; 1 for sequential runs.
    pub workers: usize,
}

impl fmt::Display for GenerationBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},w={}", self.node_count, self.workers)
    }
}

/// Parameters for a colouring benchmark.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColoringBenchParams {
    /// Nodes in the random input graph.
    pub node_count: usize,
    /// Expected neighbours per node.
    pub branching_factor: f64,
    /// Worker threads for the parallel engine; 1 for sequential runs.
    pub workers: usize,
}

impl fmt::Display for ColoringBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={},bf={},w={}",
            self.node_count, self.branching_factor, self.workers
        )
    }
}
