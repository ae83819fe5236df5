//! Unit tests for the graph generators.

use rstest::rstest;

use super::*;

#[rstest]
#[case::single(1, vec![vec![]])]
#[case::pair(2, vec![vec![1], vec![0]])]
#[case::square(4, vec![vec![1, 3], vec![0, 2], vec![1, 3], vec![0, 2]])]
fn ring_links_wrap_around(#[case] nodes: usize, #[case] expected: Vec<Vec<usize>>) {
    let graph = ring(nodes).expect("ring must build");
    let lists: Vec<Vec<usize>> = graph
        .nodes()
        .iter()
        .map(|node| node.neighbours().to_vec())
        .collect();
    assert_eq!(lists, expected);
}

#[rstest]
#[case(1, 0)]
#[case(2, 1)]
#[case(6, 15)]
fn complete_graph_has_every_pair(#[case] nodes: usize, #[case] edges: usize) {
    let graph = complete(nodes).expect("complete graph must build");
    assert_eq!(graph.edge_count(), edges);
    assert!(graph.check_structure().is_ok());
}

#[test]
fn zero_sized_graphs_are_rejected() {
    for result in [
        empty(0),
        complete(0),
        ring(0),
        empty_parallel(0, 2),
        complete_parallel(0, 2),
        ring_parallel(0, 2),
    ] {
        assert_eq!(result.expect_err("size 0 must fail"), GraphError::InvalidSize { got: 0 });
    }
    assert_eq!(
        RandomGraphParams::new(0, 1.0).expect_err("size 0 must fail"),
        GraphError::InvalidSize { got: 0 }
    );
}

#[rstest]
#[case(-0.5)]
#[case(f64::NAN)]
#[case(f64::INFINITY)]
fn bad_branching_factors_are_rejected(#[case] branching_factor: f64) {
    let err = RandomGraphParams::new(10, branching_factor).expect_err("factor must fail");
    assert!(matches!(err, GraphError::InvalidBranchingFactor { .. }));
}

#[rstest]
#[case(1, 5.0, 0.0)]
#[case(11, 5.0, 0.5)]
#[case(3, 10.0, 1.0)]
#[case(100, 0.0, 0.0)]
#[expect(clippy::float_arithmetic, reason = "compares probabilities within a tolerance")]
fn edge_probability_is_clamped(
    #[case] nodes: usize,
    #[case] branching_factor: f64,
    #[case] expected: f64,
) {
    let params = RandomGraphParams::new(nodes, branching_factor).expect("params are valid");
    assert!((params.edge_probability() - expected).abs() < 1e-12);
}

#[test]
fn parallel_construction_needs_workers() {
    let params = RandomGraphParams::new(10, 2.0).expect("params are valid");
    assert_eq!(
        random_parallel(&params, 0).expect_err("zero workers must fail"),
        GraphError::InvalidWorkerCount { got: 0 }
    );
    for result in [empty_parallel(10, 0), complete_parallel(10, 0), ring_parallel(10, 0)] {
        assert_eq!(
            result.expect_err("zero workers must fail"),
            GraphError::InvalidWorkerCount { got: 0 }
        );
    }
}

fn adjacency(graph: &Graph) -> Vec<Vec<usize>> {
    graph
        .nodes()
        .iter()
        .map(|node| node.neighbours().to_vec())
        .collect()
}

#[rstest]
#[case::single(1, 1)]
#[case::pair(2, 4)]
#[case::more_workers_than_rows(3, 8)]
#[case::uneven_blocks(23, 4)]
fn parallel_rings_match_sequential(#[case] nodes: usize, #[case] workers: usize) {
    let sequential = ring(nodes).expect("ring must build");
    let parallel = ring_parallel(nodes, workers).expect("ring must build");
    assert_eq!(adjacency(&parallel), adjacency(&sequential));
    assert!(parallel.check_structure().is_ok());
}

#[rstest]
#[case::single(1, 2, 0)]
#[case::more_workers_than_rows(4, 6, 6)]
#[case::uneven_blocks(13, 3, 78)]
fn parallel_complete_graphs_match_sequential(
    #[case] nodes: usize,
    #[case] workers: usize,
    #[case] edges: usize,
) {
    let sequential = complete(nodes).expect("complete graph must build");
    let parallel = complete_parallel(nodes, workers).expect("complete graph must build");
    assert_eq!(adjacency(&parallel), adjacency(&sequential));
    assert_eq!(parallel.edge_count(), edges);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(8)]
fn empty_parallel_matches_sequential(#[case] workers: usize) {
    let graph = empty_parallel(17, workers).expect("graph must build");
    assert_eq!(graph.len(), 17);
    assert_eq!(graph.edge_count(), 0);
    for (position, node) in graph.nodes().iter().enumerate() {
        assert_eq!(node.index(), position);
    }
}

#[rstest]
#[case(1)]
#[case(4)]
fn random_parallel_is_reproducible(#[case] workers: usize) {
    let params = RandomGraphParams::new(200, 6.0).expect("params are valid").with_seed(99);
    let sequential = random(&params).expect("graph must build");
    let parallel = random_parallel(&params, workers).expect("graph must build");
    for (left, right) in sequential.nodes().iter().zip(parallel.nodes()) {
        assert_eq!(left.neighbours(), right.neighbours());
    }
}

#[test]
fn saturated_probability_yields_complete_graph() {
    let params = RandomGraphParams::new(6, 50.0).expect("params are valid");
    let graph = random_parallel(&params, 3).expect("graph must build");
    assert_eq!(graph.edge_count(), 15);
}

#[test]
fn different_seeds_change_the_graph() {
    let base = RandomGraphParams::new(300, 8.0).expect("params are valid");
    let first = random(&base.with_seed(1)).expect("graph must build");
    let second = random(&base.with_seed(2)).expect("graph must build");
    let differs = first
        .nodes()
        .iter()
        .zip(second.nodes())
        .any(|(left, right)| left.neighbours() != right.neighbours());
    assert!(differs);
}
