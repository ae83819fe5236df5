//! Unit tests for the colouring engines and their configuration.

use rstest::rstest;

use super::*;
use crate::generate;

#[rstest]
#[case(&[], 4, Some(0))]
#[case(&[0, 1, 3], 3, Some(2))]
#[case(&[0, 1, 2], 3, None)]
#[case(&[0, 1], 2, None)]
#[case(&[7, 9], 2, Some(0))]
fn smallest_free_skips_taken_colours(
    #[case] taken: &[Color],
    #[case] max_color: Color,
    #[case] expected: Option<Color>,
) {
    assert_eq!(
        smallest_free(taken.iter().copied(), taken.len(), max_color),
        expected
    );
}

#[test]
fn sequential_colours_complete_graph_in_index_order() {
    let graph = generate::complete(5).expect("graph must build");
    let report = color_sequential(&graph, 5).expect("palette suffices");
    assert_eq!(
        graph.colors(),
        (0..5).map(Some).collect::<Vec<Option<Color>>>()
    );
    assert_eq!(report, ColoringReport::new(5, 1, 0));
}

#[test]
fn sequential_two_colours_even_ring() {
    let graph = generate::ring(4).expect("graph must build");
    color_sequential(&graph, 2).expect("two colours suffice");
    assert_eq!(graph.colors(), vec![Some(0), Some(1), Some(0), Some(1)]);
}

#[rstest]
#[case::sequential(ColoringStrategy::Sequential)]
#[case::parallel(ColoringStrategy::Parallel)]
fn exhausted_palettes_fail(#[case] strategy: ColoringStrategy) {
    let graph = generate::complete(4).expect("graph must build");
    let colorer = ColoringBuilder::new()
        .with_strategy(strategy)
        .with_max_color(3)
        .with_workers(2)
        .build()
        .expect("configuration is valid");
    let err = colorer.color(&graph).expect_err("three colours cannot cover K4");
    assert!(matches!(err, ColoringError::ColorsExhausted { max_color: 3, .. }));
}

#[test]
fn builder_rejects_empty_palette_and_zero_workers() {
    assert_eq!(
        ColoringBuilder::new().with_max_color(0).build().expect_err("palette must fail"),
        ColoringError::InvalidMaxColor { got: 0 }
    );
    assert_eq!(
        ColoringBuilder::new().with_workers(0).build().expect_err("workers must fail"),
        ColoringError::Graph(GraphError::InvalidWorkerCount { got: 0 })
    );
    let graph = generate::ring(3).expect("graph must build");
    assert_eq!(
        color_parallel(&graph, 0, 1).expect_err("palette must fail"),
        ColoringError::InvalidMaxColor { got: 0 }
    );
}

#[test]
fn default_palette_matches_node_count() {
    let colorer = ColoringBuilder::new().build().expect("defaults are valid");
    let graph = generate::complete(7).expect("graph must build");
    assert_eq!(colorer.max_color_for(&graph), 7);
    assert_eq!(colorer.strategy(), ColoringStrategy::Parallel);
    assert!(colorer.workers() >= 1);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(8)]
fn parallel_colouring_is_valid_on_complete_graph(#[case] workers: usize) {
    let graph = generate::complete(12).expect("graph must build");
    let report = color_parallel(&graph, 12, workers).expect("palette suffices");
    assert!(graph.check_valid_coloring());
    assert_eq!(report.colors_used(), 12);
    assert!(report.passes() >= 1);
}

#[test]
fn parallel_recolours_over_previous_colours() {
    let graph = generate::ring(6).expect("graph must build");
    for node in 0..6 {
        graph.set_color(node, Some(0)).expect("node exists");
    }
    color_parallel(&graph, 3, 3).expect("palette suffices");
    assert!(graph.check_valid_coloring());
}

#[test]
fn subset_leaves_other_nodes_untouched() {
    let graph = generate::complete(6).expect("graph must build");
    for (node, color) in [(0, 4), (2, 0), (4, 2)] {
        graph.set_color(node, Some(color)).expect("node exists");
    }
    let report = color_parallel_subset(&graph, &[5, 1, 3, 1], 6, 3).expect("palette suffices");
    assert_eq!(graph.color(0).expect("node exists"), Some(4));
    assert_eq!(graph.color(2).expect("node exists"), Some(0));
    assert_eq!(graph.color(4).expect("node exists"), Some(2));
    assert!(graph.check_valid_coloring());
    assert_eq!(report.colors_used(), 6);
}

#[test]
fn subset_rejects_unknown_nodes() {
    let graph = generate::ring(3).expect("graph must build");
    let err = color_parallel_subset(&graph, &[0, 9], 3, 1).expect_err("node 9 is missing");
    assert_eq!(err.graph_code(), Some(crate::error::GraphErrorCode::NodeOutOfRange));
}

#[test]
fn empty_subset_runs_no_passes() {
    let graph = generate::ring(3).expect("graph must build");
    let report = color_parallel_subset(&graph, &[], 3, 1).expect("nothing to colour");
    assert_eq!(report.passes(), 0);
    assert!(graph.colors().iter().all(Option::is_none));
}

mod properties {
    use proptest::prelude::*;

    use super::*;
    use crate::{generate::RandomGraphParams, test_utils::suite_proptest_config};

    proptest! {
        #![proptest_config(suite_proptest_config(24))]

        #[test]
        fn parallel_colouring_is_always_valid(
            nodes in 1_usize..120,
            branching_factor in 0.0_f64..12.0,
            seed in any::<u64>(),
            workers in 1_usize..6,
        ) {
            let params = RandomGraphParams::new(nodes, branching_factor)
                .expect("params are valid")
                .with_seed(seed);
            let graph = generate::random(&params).expect("graph must build");
            let max_color = Color::try_from(nodes).expect("node count fits a colour");
            color_parallel(&graph, max_color, workers).expect("palette suffices");
            prop_assert!(graph.check_valid_coloring());
        }

        #[test]
        fn subset_colouring_preserves_fixed_nodes(
            nodes in 2_usize..80,
            seed in any::<u64>(),
            stride in 2_usize..5,
        ) {
            let params = RandomGraphParams::new(nodes, 4.0)
                .expect("params are valid")
                .with_seed(seed);
            let graph = generate::random(&params).expect("graph must build");
            let max_color = Color::try_from(nodes).expect("node count fits a colour");
            color_sequential(&graph, max_color).expect("palette suffices");
            let before = graph.colors();
            let subset: Vec<usize> = (0..nodes).step_by(stride).collect();

            color_parallel_subset(&graph, &subset, max_color, 3).expect("palette suffices");

            for (node, (old, new)) in before.iter().zip(graph.colors()).enumerate() {
                if !subset.contains(&node) {
                    prop_assert_eq!(*old, new);
                }
            }
            prop_assert!(graph.check_valid_coloring());
        }
    }
}
