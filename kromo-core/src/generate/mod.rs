//! Graph generators: edge-free, complete, ring and random topologies.
//!
//! Every generator returns a [`Graph`] whose adjacency lists are sorted and
//! symmetric. Parallel variants take an explicit worker count and run on a
//! dedicated Rayon pool of that size.

mod random;
mod rng;

use rayon::prelude::*;
use tracing::instrument;

use crate::{
    error::{GraphError, Result},
    graph::Graph,
    workers::{partition, worker_pool},
};

pub use self::random::{DEFAULT_SEED, RandomGraphParams, random, random_parallel};

fn ensure_size(nodes: usize) -> Result<()> {
    if nodes == 0 {
        return Err(GraphError::InvalidSize { got: nodes });
    }
    Ok(())
}

/// Allocates `nodes` indexed nodes without edges.
///
/// # Errors
/// Returns [`GraphError::InvalidSize`] when `nodes` is zero.
///
/// # Examples
/// ```
/// let graph = kromo_core::generate::empty(4).expect("size is valid");
/// assert_eq!(graph.len(), 4);
/// assert_eq!(graph.edge_count(), 0);
/// ```
#[instrument(name = "core.generate.empty", err)]
pub fn empty(nodes: usize) -> Result<Graph> {
    ensure_size(nodes)?;
    Ok(Graph::from_sorted_lists(vec![Vec::new(); nodes]))
}

/// Allocates `nodes` edge-free nodes, splitting construction into one
/// contiguous block per worker.
///
/// # Errors
/// Returns [`GraphError::InvalidSize`] when `nodes` is zero,
/// [`GraphError::InvalidWorkerCount`] when `workers` is zero and
/// [`GraphError::WorkerPool`] when the pool cannot start.
#[instrument(name = "core.generate.empty_parallel", err)]
pub fn empty_parallel(nodes: usize, workers: usize) -> Result<Graph> {
    build_rows_parallel(nodes, workers, |_, _| Vec::new())
}

/// Builds the complete graph on `nodes` vertices.
///
/// # Errors
/// Returns [`GraphError::InvalidSize`] when `nodes` is zero.
///
/// # Examples
/// ```
/// let graph = kromo_core::generate::complete(5).expect("size is valid");
/// assert_eq!(graph.edge_count(), 10);
/// assert_eq!(graph.neighbours(2).expect("node exists"), &[0, 1, 3, 4]);
/// ```
#[instrument(name = "core.generate.complete", err)]
pub fn complete(nodes: usize) -> Result<Graph> {
    ensure_size(nodes)?;
    let lists = (0..nodes).map(|node| complete_row(node, nodes)).collect();
    Ok(Graph::from_sorted_lists(lists))
}

/// Builds the complete graph with each worker filling one contiguous block
/// of rows.
///
/// # Errors
/// Returns [`GraphError::InvalidSize`] when `nodes` is zero,
/// [`GraphError::InvalidWorkerCount`] when `workers` is zero and
/// [`GraphError::WorkerPool`] when the pool cannot start.
///
/// # Examples
/// ```
/// let graph = kromo_core::generate::complete_parallel(6, 3).expect("inputs are valid");
/// assert_eq!(graph.edge_count(), 15);
/// ```
#[instrument(name = "core.generate.complete_parallel", err)]
pub fn complete_parallel(nodes: usize, workers: usize) -> Result<Graph> {
    build_rows_parallel(nodes, workers, complete_row)
}

/// Builds a cycle where node `i` is adjacent to `i - 1` and `i + 1`
/// modulo `nodes`.
///
/// One and two node rings collapse to an isolated node and a single edge
/// respectively, as the wrap-around neighbours coincide.
///
/// # Errors
/// Returns [`GraphError::InvalidSize`] when `nodes` is zero.
#[instrument(name = "core.generate.ring", err)]
pub fn ring(nodes: usize) -> Result<Graph> {
    ensure_size(nodes)?;
    let lists = (0..nodes).map(|node| ring_row(node, nodes)).collect();
    Ok(Graph::from_sorted_lists(lists))
}

/// Builds the same cycle as [`ring`] with rows split across `workers`
/// threads.
///
/// # Errors
/// Returns [`GraphError::InvalidSize`] when `nodes` is zero,
/// [`GraphError::InvalidWorkerCount`] when `workers` is zero and
/// [`GraphError::WorkerPool`] when the pool cannot start.
#[instrument(name = "core.generate.ring_parallel", err)]
pub fn ring_parallel(nodes: usize, workers: usize) -> Result<Graph> {
    build_rows_parallel(nodes, workers, ring_row)
}

/// Fills one adjacency row per node on a dedicated pool, one contiguous
/// block of rows per worker.
fn build_rows_parallel<F>(nodes: usize, workers: usize, row: F) -> Result<Graph>
where
    F: Fn(usize, usize) -> Vec<usize> + Sync,
{
    ensure_size(nodes)?;
    let pool = worker_pool(workers)?;
    let lists = pool.install(|| {
        partition(nodes, workers)
            .into_par_iter()
            .flat_map_iter(|range| range.map(|node| row(node, nodes)))
            .collect::<Vec<Vec<usize>>>()
    });
    Ok(Graph::from_sorted_lists(lists))
}

fn complete_row(node: usize, nodes: usize) -> Vec<usize> {
    (0..nodes).filter(|&other| other != node).collect()
}

fn ring_row(node: usize, nodes: usize) -> Vec<usize> {
    let last = nodes.saturating_sub(1);
    let previous = if node == 0 { last } else { node - 1 };
    let next = if node == last { 0 } else { node + 1 };
    let mut row = vec![previous, next];
    row.retain(|&other| other != node);
    row.sort_unstable();
    row.dedup();
    row
}

#[cfg(test)]
mod tests;
