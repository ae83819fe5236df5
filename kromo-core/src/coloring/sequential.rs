use tracing::{debug, instrument};

use super::{ColoringReport, ensure_palette, smallest_free};
use crate::{
    error::ColoringError,
    graph::{Color, Graph, Node},
};

/// Colours `graph` greedily in index order using colours `0..max_color`.
///
/// Existing colours are cleared first. Uncoloured neighbours impose no
/// constraint, so each node receives the smallest colour not used by any
/// lower-indexed neighbour. The result is deterministic.
///
/// # Errors
/// Returns [`ColoringError::InvalidMaxColor`] when `max_color` is zero and
/// [`ColoringError::ColorsExhausted`] for the first node with no free colour.
///
/// # Examples
/// ```
/// use kromo_core::{coloring::color_sequential, generate};
///
/// let graph = generate::complete(5).expect("graph must build");
/// color_sequential(&graph, 5).expect("five colours suffice");
/// assert_eq!(graph.colors(), vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);
/// ```
#[instrument(name = "core.color_sequential", err, skip(graph), fields(nodes = graph.len()))]
pub fn color_sequential(graph: &Graph, max_color: Color) -> Result<ColoringReport, ColoringError> {
    ensure_palette(max_color)?;
    graph.clear_colors();
    for node in graph.nodes() {
        let taken = node
            .neighbours()
            .iter()
            .filter_map(|&neighbour| graph.node(neighbour).and_then(Node::color));
        let color = smallest_free(taken, node.degree(), max_color).ok_or(
            ColoringError::ColorsExhausted {
                node: node.index(),
                max_color,
            },
        )?;
        node.commit(Some(color));
    }
    let report = ColoringReport::new(graph.colors_used(), 1, 0);
    debug!(colors_used = report.colors_used(), "sequential colouring complete");
    Ok(report)
}
