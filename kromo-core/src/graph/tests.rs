//! Unit tests for graph storage and its invariants.

use rstest::rstest;

use super::{ColoringViolation, Graph, GraphInvariantViolation};
use crate::error::GraphError;

fn path_of_three() -> Graph {
    Graph::from_adjacency(vec![vec![1], vec![2, 0], vec![1]]).expect("path must build")
}

#[test]
#[expect(clippy::float_arithmetic, reason = "compares the mean degree within a tolerance")]
fn from_adjacency_sorts_lists_and_assigns_indices() {
    let graph = path_of_three();
    assert_eq!(graph.len(), 3);
    for (position, node) in graph.nodes().iter().enumerate() {
        assert_eq!(node.index(), position);
    }
    assert_eq!(graph.neighbours(1).expect("node 1 exists"), &[0, 2]);
    assert_eq!(graph.edge_count(), 2);
    assert!((graph.average_degree() - 4.0 / 3.0).abs() < f64::EPSILON);
}

#[rstest]
#[case::empty(vec![], GraphError::InvalidSize { got: 0 })]
#[case::self_loop(
    vec![vec![0]],
    GraphError::InvalidAdjacency { node: 0, reason: "node is adjacent to itself" }
)]
#[case::duplicate(
    vec![vec![1, 1], vec![0]],
    GraphError::InvalidAdjacency { node: 0, reason: "neighbour is listed twice" }
)]
#[case::asymmetric(
    vec![vec![1], vec![]],
    GraphError::InvalidAdjacency { node: 0, reason: "edge has no reverse edge" }
)]
#[case::out_of_range(
    vec![vec![5], vec![]],
    GraphError::InvalidAdjacency { node: 0, reason: "neighbour is out of range" }
)]
fn from_adjacency_rejects_broken_lists(#[case] lists: Vec<Vec<usize>>, #[case] expected: GraphError) {
    let err = Graph::from_adjacency(lists).expect_err("lists must be rejected");
    assert_eq!(err, expected);
}

#[test]
fn check_structure_reports_missing_backlink() {
    let graph = Graph {
        nodes: vec![super::Node::new(0, vec![1]), super::Node::new(1, vec![])],
    };
    assert_eq!(
        graph.check_structure(),
        Err(GraphInvariantViolation::MissingBacklink {
            origin: 0,
            target: 1
        })
    );
}

#[test]
fn uncoloured_nodes_invalidate_the_colouring() {
    let graph = path_of_three();
    graph.set_color(0, Some(0)).expect("node exists");
    graph.set_color(1, Some(1)).expect("node exists");
    assert_eq!(
        graph.validate_coloring(),
        Err(ColoringViolation::Uncolored { node: 2 })
    );
    assert!(!graph.check_valid_coloring());
}

#[test]
fn adjacent_nodes_with_equal_colours_conflict() {
    let graph = path_of_three();
    for (node, color) in [(0, 0), (1, 1), (2, 1)] {
        graph.set_color(node, Some(color)).expect("node exists");
    }
    assert!(matches!(
        graph.validate_coloring(),
        Err(ColoringViolation::Conflict { color: 1, .. })
    ));
}

#[test]
fn valid_colouring_passes_and_counts_colours() {
    let graph = path_of_three();
    for (node, color) in [(0, 0), (1, 1), (2, 0)] {
        graph.set_color(node, Some(color)).expect("node exists");
    }
    assert!(graph.check_valid_coloring());
    assert_eq!(graph.colors_used(), 2);
    assert_eq!(graph.colors(), vec![Some(0), Some(1), Some(0)]);

    graph.clear_colors();
    assert!(graph.colors().iter().all(Option::is_none));
}

#[test]
fn out_of_range_lookups_fail() {
    let graph = path_of_three();
    assert_eq!(
        graph.set_color(3, Some(0)),
        Err(GraphError::NodeOutOfRange { node: 3, len: 3 })
    );
    assert!(graph.node(3).is_none());
}

#[test]
fn clones_copy_colours_independently() {
    let graph = path_of_three();
    graph.set_color(0, Some(4)).expect("node exists");
    let copy = graph.clone();
    graph.set_color(0, Some(1)).expect("node exists");
    assert_eq!(copy.color(0).expect("node exists"), Some(4));
}
