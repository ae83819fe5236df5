//! Erdős–Rényi style random graphs with a target branching factor.
//!
//! Every unordered pair `(i, j)` with `i < j` is trialled exactly once by the
//! task that owns row `i`, with edge probability `bf / (N - 1)`. The parallel
//! variant records edges through per-node locks so that the symmetric
//! back-edge written by one row never races the forward edges of another.

use std::sync::Mutex;

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, instrument};

use super::rng::row_rng;
use crate::{
    error::{GraphError, Result},
    graph::Graph,
    workers::worker_pool,
};

/// Base seed used when the caller does not provide one.
pub const DEFAULT_SEED: u64 = 0x5EED_C010;

/// Validated inputs for the random graph generators.
///
/// # Examples
/// ```
/// use kromo_core::generate::RandomGraphParams;
///
/// let params = RandomGraphParams::new(101, 10.0)
///     .expect("parameters are valid")
///     .with_seed(42);
/// assert_eq!(params.node_count(), 101);
/// assert!((params.edge_probability() - 0.1).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomGraphParams {
    node_count: usize,
    branching_factor: f64,
    seed: u64,
}

impl RandomGraphParams {
    /// Validates a node count and desired branching factor.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidSize`] when `node_count` is zero and
    /// [`GraphError::InvalidBranchingFactor`] when `branching_factor` is
    /// negative or not finite.
    pub const fn new(node_count: usize, branching_factor: f64) -> Result<Self> {
        if node_count == 0 {
            return Err(GraphError::InvalidSize { got: node_count });
        }
        if !branching_factor.is_finite() || branching_factor < 0.0 {
            return Err(GraphError::InvalidBranchingFactor {
                got: branching_factor,
            });
        }
        Ok(Self {
            node_count,
            branching_factor,
            seed: DEFAULT_SEED,
        })
    }

    /// Seeds the row streams to make generation reproducible.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the number of nodes to generate.
    #[must_use]
    #[rustfmt::skip]
    pub const fn node_count(&self) -> usize { self.node_count }

    /// Returns the desired average degree.
    #[must_use]
    #[rustfmt::skip]
    pub const fn branching_factor(&self) -> f64 { self.branching_factor }

    /// Returns the base seed.
    #[must_use]
    #[rustfmt::skip]
    pub const fn seed(&self) -> u64 { self.seed }

    /// Returns the per-pair edge probability, clamped to `[0, 1]`.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        clippy::float_arithmetic,
        reason = "Edge probability is the branching factor spread over N - 1 partners."
    )]
    pub const fn edge_probability(&self) -> f64 {
        if self.node_count <= 1 {
            return 0.0;
        }
        (self.branching_factor / (self.node_count - 1) as f64).min(1.0)
    }
}

/// Generates a random graph on the calling thread.
///
/// # Errors
/// Never fails for validated parameters; the `Result` mirrors
/// [`random_parallel`].
///
/// # Examples
/// ```
/// use kromo_core::generate::{self, RandomGraphParams};
///
/// let params = RandomGraphParams::new(50, 4.0).expect("valid").with_seed(1);
/// let graph = generate::random(&params).expect("generation succeeds");
/// assert_eq!(graph.len(), 50);
/// assert!(graph.check_structure().is_ok());
/// ```
#[instrument(
    name = "core.generate.random",
    err,
    skip(params),
    fields(nodes = params.node_count(), branching_factor = params.branching_factor()),
)]
pub fn random(params: &RandomGraphParams) -> Result<Graph> {
    let nodes = params.node_count();
    let mut lists = vec![Vec::new(); nodes];
    for row in 0..nodes {
        let accepted = sample_row(params, row);
        for &col in &accepted {
            if let Some(list) = lists.get_mut(col) {
                list.push(row);
            }
        }
        if let Some(list) = lists.get_mut(row) {
            list.extend(accepted);
        }
    }
    for list in &mut lists {
        list.sort_unstable();
    }
    let graph = Graph::from_sorted_lists(lists);
    debug!(edges = graph.edge_count(), "random graph generated");
    Ok(graph)
}

/// Generates a random graph with rows sampled concurrently by `workers`
/// threads.
///
/// For a fixed seed the result is identical to [`random`].
///
/// # Errors
/// Returns [`GraphError::InvalidWorkerCount`] when `workers` is zero,
/// [`GraphError::WorkerPool`] when the pool cannot start and
/// [`GraphError::LockPoisoned`] if a worker panicked mid-write.
#[instrument(
    name = "core.generate.random_parallel",
    err,
    skip(params),
    fields(nodes = params.node_count(), branching_factor = params.branching_factor()),
)]
pub fn random_parallel(params: &RandomGraphParams, workers: usize) -> Result<Graph> {
    let pool = worker_pool(workers)?;
    let staging = AdjacencyStaging::new(params.node_count());
    pool.install(|| {
        (0..params.node_count())
            .into_par_iter()
            .try_for_each(|row| staging.link_row(row, &sample_row(params, row)))
    })?;
    let graph = staging.into_graph()?;
    debug!(edges = graph.edge_count(), "random graph generated");
    Ok(graph)
}

/// Trials every pair `(row, col)` with `col > row` and returns the accepted
/// columns in ascending order.
fn sample_row(params: &RandomGraphParams, row: usize) -> Vec<usize> {
    let probability = params.edge_probability();
    if probability <= 0.0 {
        return Vec::new();
    }
    let mut rng = row_rng(params.seed(), row);
    (row + 1..params.node_count())
        .filter(|_| rng.gen_bool(probability))
        .collect()
}

/// Adjacency lists under one mutex per node.
struct AdjacencyStaging {
    lists: Vec<Mutex<Vec<usize>>>,
}

impl AdjacencyStaging {
    fn new(nodes: usize) -> Self {
        Self {
            lists: (0..nodes).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Records `row`'s forward edges, then each back-edge. At most one node
    /// lock is held at a time.
    fn link_row(&self, row: usize, cols: &[usize]) -> Result<()> {
        if cols.is_empty() {
            return Ok(());
        }
        self.lock(row)?.extend_from_slice(cols);
        for &col in cols {
            self.lock(col)?.push(row);
        }
        Ok(())
    }

    fn lock(&self, node: usize) -> Result<std::sync::MutexGuard<'_, Vec<usize>>> {
        let list = self.lists.get(node).ok_or(GraphError::NodeOutOfRange {
            node,
            len: self.lists.len(),
        })?;
        list.lock().map_err(|_| GraphError::LockPoisoned {
            resource: "adjacency list",
        })
    }

    fn into_graph(self) -> Result<Graph> {
        let lists = self
            .lists
            .into_iter()
            .map(|slot| {
                let mut list = slot.into_inner().map_err(|_| GraphError::LockPoisoned {
                    resource: "adjacency list",
                })?;
                list.sort_unstable();
                Ok(list)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Graph::from_sorted_lists(lists))
    }
}
