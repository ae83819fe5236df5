//! Splits a graph into one contiguous share per peer.

use kromo_core::{Color, Graph, partition};

use crate::{
    error::NetError,
    wire::{MAX_PAYLOAD_LEN, Subgraph},
};

/// Encoded adjacency rows per `SUBGRAPH` frame. Half the frame cap leaves
/// room for the partition table.
pub(crate) const ROW_BYTES_PER_FRAME: usize = 32 * 1024 * 1024;

/// Vertex count, palette, node count and a 256-entry partition table.
const LARGEST_SHARE_HEADER: usize = 4 + 4 + 1 + 4 * 256;

const _: () = assert!(ROW_BYTES_PER_FRAME + LARGEST_SHARE_HEADER <= MAX_PAYLOAD_LEN);

fn wire_index(value: usize, nodes: usize) -> Result<u32, NetError> {
    u32::try_from(value).map_err(|_| NetError::GraphTooLarge { nodes })
}

/// Builds the `SUBGRAPH` payload for each of `peers` nodes, in index order.
///
/// Vertex ranges come from [`partition`], so their sizes differ by at most
/// one and trailing peers own nothing when there are more peers than
/// vertices.
pub(crate) fn build_subgraphs(
    graph: &Graph,
    peers: usize,
    max_color: Color,
) -> Result<Vec<Subgraph>, NetError> {
    let nodes = graph.len();
    let total = wire_index(nodes, nodes)?;
    let ranges = partition(nodes, peers);
    let mut offsets = Vec::with_capacity(ranges.len() + 1);
    offsets.push(0);
    for range in &ranges {
        offsets.push(wire_index(range.end, nodes)?);
    }

    ranges
        .into_iter()
        .map(|range| {
            let owned = graph.nodes().get(range).unwrap_or_default();
            let adjacency = owned
                .iter()
                .map(|node| {
                    node.neighbours()
                        .iter()
                        .map(|&neighbour| wire_index(neighbour, nodes))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Subgraph::new(total, max_color, offsets.clone(), adjacency)?)
        })
        .collect()
}
