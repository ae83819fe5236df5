//! Structural and colouring invariants for [`Graph`].
//!
//! Every edge must carry a matching reverse edge, adjacency lists may not
//! reference their own node or repeat a neighbour, and each node's index must
//! equal its position.

use thiserror::Error;
use tracing::{debug, trace};

use super::{Color, Graph};
use crate::error::GraphError;

/// A violated structural invariant.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum GraphInvariantViolation {
    /// A node's stored index differs from its position.
    #[error("node at position {position} reports index {index}")]
    IndexMismatch {
        /// Position in the node sequence.
        position: usize,
        /// Index stored on the node.
        index: usize,
    },
    /// A neighbour index does not name a node.
    #[error("node {node} references missing neighbour {neighbour}")]
    NeighbourOutOfRange {
        /// Node owning the adjacency list.
        node: usize,
        /// Offending neighbour index.
        neighbour: usize,
    },
    /// A node lists itself as a neighbour.
    #[error("node {node} is adjacent to itself")]
    SelfLoop {
        /// Offending node.
        node: usize,
    },
    /// A neighbour appears more than once.
    #[error("node {node} lists neighbour {neighbour} more than once")]
    DuplicateNeighbour {
        /// Node owning the adjacency list.
        node: usize,
        /// Repeated neighbour index.
        neighbour: usize,
    },
    /// An edge has no reverse edge.
    #[error("edge {origin} -> {target} has no backlink")]
    MissingBacklink {
        /// Node listing the edge.
        origin: usize,
        /// Node missing the reverse edge.
        target: usize,
    },
}

impl GraphInvariantViolation {
    pub(crate) const fn into_graph_error(self) -> GraphError {
        let (node, reason) = match self {
            Self::IndexMismatch { position, .. } => (position, "index does not match position"),
            Self::NeighbourOutOfRange { node, .. } => (node, "neighbour is out of range"),
            Self::SelfLoop { node } => (node, "node is adjacent to itself"),
            Self::DuplicateNeighbour { node, .. } => (node, "neighbour is listed twice"),
            Self::MissingBacklink { origin, .. } => (origin, "edge has no reverse edge"),
        };
        GraphError::InvalidAdjacency { node, reason }
    }
}

/// A defect in a node colouring.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ColoringViolation {
    /// A node has no colour.
    #[error("node {node} is uncoloured")]
    Uncolored {
        /// The uncoloured node.
        node: usize,
    },
    /// Two adjacent nodes share a colour.
    #[error("nodes {left} and {right} are adjacent and share colour {color}")]
    Conflict {
        /// First endpoint.
        left: usize,
        /// Second endpoint.
        right: usize,
        /// The shared colour.
        color: Color,
    },
}

impl Graph {
    /// Verifies index, range, self-loop, duplicate and symmetry invariants.
    ///
    /// # Errors
    /// Returns the first [`GraphInvariantViolation`] encountered.
    ///
    /// # Examples
    /// ```
    /// use kromo_core::generate;
    ///
    /// let graph = generate::ring(6).expect("ring must build");
    /// assert!(graph.check_structure().is_ok());
    /// ```
    pub fn check_structure(&self) -> Result<(), GraphInvariantViolation> {
        let len = self.nodes.len();
        trace!(nodes = len, edges = self.edge_count(), "checking graph structure");
        for (position, node) in self.nodes.iter().enumerate() {
            if node.index != position {
                return Err(GraphInvariantViolation::IndexMismatch {
                    position,
                    index: node.index,
                });
            }
            let mut previous = None;
            for &neighbour in node.neighbours() {
                if neighbour >= len {
                    return Err(GraphInvariantViolation::NeighbourOutOfRange {
                        node: position,
                        neighbour,
                    });
                }
                if neighbour == position {
                    return Err(GraphInvariantViolation::SelfLoop { node: position });
                }
                if previous == Some(neighbour) {
                    return Err(GraphInvariantViolation::DuplicateNeighbour {
                        node: position,
                        neighbour,
                    });
                }
                previous = Some(neighbour);
                let has_backlink = self
                    .nodes
                    .get(neighbour)
                    .is_some_and(|target| target.neighbours().binary_search(&position).is_ok());
                if !has_backlink {
                    debug!(origin = position, target = neighbour, "missing backlink");
                    return Err(GraphInvariantViolation::MissingBacklink {
                        origin: position,
                        target: neighbour,
                    });
                }
            }
        }
        Ok(())
    }
}
