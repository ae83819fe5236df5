//! Vertex and edge storage shared by the generators and colouring engines.
//!
//! A [`Graph`] owns a fixed batch of [`Node`]s allocated at construction. Each
//! node keeps its position as its index, a sorted adjacency list and a colour
//! slot guarded by its own mutex so parallel colouring can commit colours
//! without a graph-wide lock.

mod invariants;

use std::{
    collections::BTreeSet,
    sync::{Mutex, PoisonError},
};

use rayon::prelude::*;

use crate::error::{GraphError, Result};

pub use self::invariants::{ColoringViolation, GraphInvariantViolation};

/// Colour label assigned to a node. Uncoloured nodes hold `None`.
pub type Color = u32;

/// A single vertex: its index, neighbours and current colour.
#[derive(Debug)]
pub struct Node {
    index: usize,
    adjacency: Vec<usize>,
    color: Mutex<Option<Color>>,
}

impl Node {
    pub(crate) const fn new(index: usize, adjacency: Vec<usize>) -> Self {
        Self {
            index,
            adjacency,
            color: Mutex::new(None),
        }
    }

    /// Returns the node's position within its graph.
    #[must_use]
    #[rustfmt::skip]
    pub const fn index(&self) -> usize { self.index }

    /// Returns the sorted indices of adjacent nodes.
    #[must_use]
    #[rustfmt::skip]
    pub fn neighbours(&self) -> &[usize] { &self.adjacency }

    /// Returns the number of adjacent nodes.
    #[must_use]
    #[rustfmt::skip]
    pub const fn degree(&self) -> usize { self.adjacency.len() }

    /// Returns the committed colour, if any.
    #[must_use]
    pub fn color(&self) -> Option<Color> {
        // The slot holds a plain `Copy` value, so a poisoned guard still
        // carries a whole colour.
        *self.color.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn commit(&self, color: Option<Color>) {
        *self.color.lock().unwrap_or_else(PoisonError::into_inner) = color;
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            adjacency: self.adjacency.clone(),
            color: Mutex::new(self.color()),
        }
    }
}

/// An undirected graph with a fixed node count.
///
/// # Examples
/// ```
/// use kromo_core::Graph;
///
/// let graph = Graph::from_adjacency(vec![vec![1], vec![0, 2], vec![1]])
///     .expect("adjacency is symmetric");
/// assert_eq!(graph.len(), 3);
/// assert_eq!(graph.edge_count(), 2);
/// assert!(!graph.check_valid_coloring());
/// ```
#[derive(Clone, Debug)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Builds a graph from adjacency lists that are already sorted, symmetric
    /// and free of self loops.
    pub(crate) fn from_sorted_lists(lists: Vec<Vec<usize>>) -> Self {
        let nodes = lists
            .into_iter()
            .enumerate()
            .map(|(index, adjacency)| Node::new(index, adjacency))
            .collect();
        let graph = Self { nodes };
        debug_assert!(graph.check_structure().is_ok());
        graph
    }

    /// Builds a graph from explicit adjacency lists, validating every node
    /// invariant.
    ///
    /// Lists may be given in any order; they are stored sorted.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidSize`] for an empty list set and
    /// [`GraphError::InvalidAdjacency`] when a neighbour is out of range,
    /// refers to the node itself, is repeated, or lacks its reverse edge.
    pub fn from_adjacency(mut lists: Vec<Vec<usize>>) -> Result<Self> {
        if lists.is_empty() {
            return Err(GraphError::InvalidSize { got: 0 });
        }
        for list in &mut lists {
            list.sort_unstable();
        }
        let graph = Self {
            nodes: lists
                .into_iter()
                .enumerate()
                .map(|(index, adjacency)| Node::new(index, adjacency))
                .collect(),
        };
        graph
            .check_structure()
            .map_err(GraphInvariantViolation::into_graph_error)?;
        Ok(graph)
    }

    /// Returns the number of nodes.
    #[must_use]
    #[rustfmt::skip]
    pub const fn len(&self) -> usize { self.nodes.len() }

    /// Returns whether the graph has no nodes.
    #[must_use]
    #[rustfmt::skip]
    pub const fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Returns all nodes in index order.
    #[must_use]
    #[rustfmt::skip]
    pub fn nodes(&self) -> &[Node] { &self.nodes }

    /// Returns the node at `index`, if present.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub(crate) fn try_node(&self, index: usize) -> Result<&Node> {
        self.nodes.get(index).ok_or(GraphError::NodeOutOfRange {
            node: index,
            len: self.nodes.len(),
        })
    }

    /// Returns the neighbours of `index`.
    ///
    /// # Errors
    /// Returns [`GraphError::NodeOutOfRange`] when `index` is not a node.
    pub fn neighbours(&self, index: usize) -> Result<&[usize]> {
        self.try_node(index).map(Node::neighbours)
    }

    /// Returns the number of undirected edges.
    #[must_use]
    #[expect(
        clippy::integer_division,
        clippy::integer_division_remainder_used,
        reason = "Every edge is listed at both endpoints, so the degree sum is even."
    )]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(Node::degree).sum::<usize>() / 2
    }

    /// Returns the measured branching factor, `2·|E| / N`.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        clippy::float_arithmetic,
        reason = "The mean degree is a floating-point ratio of two counts."
    )]
    pub fn average_degree(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let endpoints: usize = self.nodes.iter().map(Node::degree).sum();
        endpoints as f64 / self.nodes.len() as f64
    }

    /// Returns the committed colour of `index`.
    ///
    /// # Errors
    /// Returns [`GraphError::NodeOutOfRange`] when `index` is not a node.
    pub fn color(&self, index: usize) -> Result<Option<Color>> {
        self.try_node(index).map(Node::color)
    }

    /// Overwrites the colour of `index`.
    ///
    /// # Errors
    /// Returns [`GraphError::NodeOutOfRange`] when `index` is not a node.
    pub fn set_color(&self, index: usize, color: Option<Color>) -> Result<()> {
        self.try_node(index)?.commit(color);
        Ok(())
    }

    /// Returns a snapshot of every node's colour in index order.
    #[must_use]
    pub fn colors(&self) -> Vec<Option<Color>> {
        self.nodes.iter().map(Node::color).collect()
    }

    /// Marks every node as uncoloured.
    pub fn clear_colors(&self) {
        for node in &self.nodes {
            node.commit(None);
        }
    }

    /// Returns the number of distinct colours currently assigned.
    #[must_use]
    pub fn colors_used(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(Node::color)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Returns whether every node is coloured and no edge joins two nodes of
    /// the same colour.
    #[must_use]
    pub fn check_valid_coloring(&self) -> bool {
        self.validate_coloring().is_ok()
    }

    /// Reports the first colouring defect found, if any.
    ///
    /// # Errors
    /// Returns [`ColoringViolation::Uncolored`] for a node without a colour
    /// and [`ColoringViolation::Conflict`] for adjacent nodes sharing one.
    pub fn validate_coloring(&self) -> core::result::Result<(), ColoringViolation> {
        self.nodes.par_iter().try_for_each(|node| {
            let color = node
                .color()
                .ok_or(ColoringViolation::Uncolored { node: node.index })?;
            for &neighbour in node.neighbours() {
                let other = self.nodes.get(neighbour).and_then(Node::color);
                if other == Some(color) {
                    return Err(ColoringViolation::Conflict {
                        left: node.index,
                        right: neighbour,
                        color,
                    });
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests;
