//! Optimistic parallel greedy colouring.
//!
//! Each pass colours its active nodes concurrently. A node reads its
//! neighbours' committed colours, commits the smallest free colour under its
//! own lock, then rechecks: a lower-indexed neighbour that now holds the same
//! colour wins and the node picks again. Because a lower neighbour can still
//! recommit after a higher node has settled, a validation pass follows the
//! barrier and returns every node that shares a colour with a lower-indexed
//! or fixed neighbour to the next pass. The lowest active node is never
//! returned, so the active set shrinks every pass.

use rayon::prelude::*;
use tracing::{debug, instrument};

use super::{ColoringReport, ensure_palette, smallest_free};
use crate::{
    error::ColoringError,
    graph::{Color, Graph, Node},
    workers::worker_pool,
};

/// Colours every node of `graph` using `workers` threads and colours
/// `0..max_color`, replacing any previous colours.
///
/// # Errors
/// Returns [`ColoringError::InvalidMaxColor`] when `max_color` is zero,
/// [`ColoringError::ColorsExhausted`] when a node finds no free colour and
/// [`ColoringError::Graph`] when the worker pool cannot be built.
///
/// # Examples
/// ```
/// use kromo_core::{coloring::color_parallel, generate};
///
/// let graph = generate::complete(8).expect("graph must build");
/// let report = color_parallel(&graph, 8, 4).expect("eight colours suffice");
/// assert_eq!(report.colors_used(), 8);
/// assert!(graph.check_valid_coloring());
/// ```
#[instrument(name = "core.color_parallel", err, skip(graph), fields(nodes = graph.len()))]
pub fn color_parallel(
    graph: &Graph,
    max_color: Color,
    workers: usize,
) -> Result<ColoringReport, ColoringError> {
    ensure_palette(max_color)?;
    graph.clear_colors();
    let active = vec![true; graph.len()];
    run_passes(graph, (0..graph.len()).collect(), active, max_color, workers)
}

/// Colours only `subset`, treating every other node's current colour as a
/// fixed constraint.
///
/// Nodes in `subset` are uncoloured before the first pass; nodes outside it
/// are never written. Duplicate entries are ignored.
///
/// # Errors
/// As for [`color_parallel`], plus [`ColoringError::Graph`] wrapping
/// [`crate::GraphError::NodeOutOfRange`] when `subset` names a missing node.
///
/// # Examples
/// ```
/// use kromo_core::{coloring::color_parallel_subset, generate};
///
/// let graph = generate::ring(4).expect("graph must build");
/// graph.set_color(0, Some(0)).expect("node exists");
/// graph.set_color(2, Some(1)).expect("node exists");
/// color_parallel_subset(&graph, &[1, 3], 3, 2).expect("three colours suffice");
/// assert_eq!(graph.colors(), vec![Some(0), Some(2), Some(1), Some(2)]);
/// ```
#[instrument(
    name = "core.color_parallel_subset",
    err,
    skip(graph, subset),
    fields(nodes = graph.len(), subset = subset.len()),
)]
pub fn color_parallel_subset(
    graph: &Graph,
    subset: &[usize],
    max_color: Color,
    workers: usize,
) -> Result<ColoringReport, ColoringError> {
    ensure_palette(max_color)?;
    let mut active = vec![false; graph.len()];
    for &node in subset {
        graph.try_node(node)?;
        if let Some(flag) = active.get_mut(node) {
            *flag = true;
        }
    }
    let pending: Vec<usize> = active
        .iter()
        .enumerate()
        .filter_map(|(node, &flag)| flag.then_some(node))
        .collect();
    for &node in &pending {
        graph.set_color(node, None)?;
    }
    run_passes(graph, pending, active, max_color, workers)
}

fn run_passes(
    graph: &Graph,
    mut pending: Vec<usize>,
    mut active: Vec<bool>,
    max_color: Color,
    workers: usize,
) -> Result<ColoringReport, ColoringError> {
    let pool = worker_pool(workers)?;
    let mut passes = 0;
    let mut recolored = 0;
    while !pending.is_empty() {
        passes += 1;
        pool.install(|| {
            pending
                .par_iter()
                .try_for_each(|&node| color_optimistically(graph, node, max_color))
        })?;
        let conflicted: Vec<usize> = pool.install(|| {
            pending
                .par_iter()
                .copied()
                .filter(|&node| must_yield(graph, &active, node))
                .collect()
        });
        debug!(
            pass = passes,
            coloured = pending.len(),
            conflicts = conflicted.len(),
            "parallel colouring pass complete"
        );
        for &node in &pending {
            if let Some(flag) = active.get_mut(node) {
                *flag = false;
            }
        }
        for &node in &conflicted {
            if let Some(flag) = active.get_mut(node) {
                *flag = true;
            }
        }
        recolored += conflicted.len();
        pending = conflicted;
    }
    Ok(ColoringReport::new(graph.colors_used(), passes, recolored))
}

/// Commits a colour for `index` that no lower-indexed neighbour contradicts
/// at the time of the final recheck.
fn color_optimistically(graph: &Graph, index: usize, max_color: Color) -> Result<(), ColoringError> {
    let node = graph.try_node(index)?;
    loop {
        let taken = neighbour_colors(graph, node);
        let color = smallest_free(taken, node.degree(), max_color)
            .ok_or(ColoringError::ColorsExhausted { node: index, max_color })?;
        node.commit(Some(color));
        let contested = node.neighbours().iter().any(|&neighbour| {
            neighbour < index && graph.node(neighbour).and_then(Node::color) == Some(color)
        });
        if !contested {
            return Ok(());
        }
    }
}

fn neighbour_colors<'a>(graph: &'a Graph, node: &'a Node) -> impl Iterator<Item = Color> + 'a {
    node.neighbours()
        .iter()
        .filter_map(|&neighbour| graph.node(neighbour).and_then(Node::color))
}

/// Whether `index` shares its colour with a neighbour that takes precedence:
/// any lower-indexed neighbour, or any neighbour outside the active set.
fn must_yield(graph: &Graph, active: &[bool], index: usize) -> bool {
    let Some(node) = graph.node(index) else {
        return false;
    };
    let Some(color) = node.color() else {
        return true;
    };
    node.neighbours().iter().any(|&neighbour| {
        let precedes = neighbour < index || !active.get(neighbour).copied().unwrap_or(false);
        precedes && graph.node(neighbour).and_then(Node::color) == Some(color)
    })
}
