//! Graph fixtures built once per benchmark case.

use std::{num::NonZeroUsize, thread};

use kromo_core::{
    Graph,
    generate::{self, RandomGraphParams},
};

use crate::{error::BenchSetupError, params::ColoringBenchParams};

/// Seed used for every generated benchmark graph.
pub const SEED: u64 = 42;

/// Worker count for parallel variants: the machine's available parallelism.
#[must_use]
pub fn available_workers() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Generates the random input graph described by `params`.
///
/// # Errors
/// Returns [`BenchSetupError::Graph`] when the parameters are rejected.
pub fn random_graph(params: &ColoringBenchParams) -> Result<Graph, BenchSetupError> {
    let graph_params =
        RandomGraphParams::new(params.node_count, params.branching_factor)?.with_seed(SEED);
    Ok(generate::random_parallel(&graph_params, available_workers())?)
}

/// Fails unless `graph` carries a complete proper colouring.
///
/// # Errors
/// Returns [`BenchSetupError::InvalidColoring`] naming `context`.
pub fn ensure_valid(graph: &Graph, context: &'static str) -> Result<(), BenchSetupError> {
    if graph.check_valid_coloring() {
        Ok(())
    } else {
        Err(BenchSetupError::InvalidColoring { context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kromo_core::coloring::color_sequential;

    #[test]
    fn fixtures_are_reproducible_and_colourable() {
        let params = ColoringBenchParams {
            node_count: 64,
            branching_factor: 4.0,
            workers: 1,
        };
        let first = random_graph(&params).expect("graph builds");
        let second = random_graph(&params).expect("graph builds");
        assert_eq!(first.edge_count(), second.edge_count());

        let err = ensure_valid(&first, "uncoloured").expect_err("nothing is coloured yet");
        assert!(matches!(err, BenchSetupError::InvalidColoring { context: "uncoloured" }));
        color_sequential(&first, 64).expect("a full palette suffices");
        ensure_valid(&first, "sequential").expect("sequential colouring is proper");
    }
}
