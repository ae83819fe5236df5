//! Graph construction benchmarks.
//!
//! Compares sequential and parallel construction of edge-free graphs, rings
//! and seeded random graphs. Both random variants build identical graphs, so the
//! difference is purely scheduling.
#![expect(
    missing_docs,
    reason = "Criterion macros generate items without doc comments"
)]
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use kromo_benches::{
    error::BenchSetupError,
    fixtures::{SEED, available_workers},
    params::GenerationBenchParams,
};
use kromo_core::generate::{self, RandomGraphParams};

/// Node counts for edge-free construction.
const EMPTY_SIZES: &[usize] = &[10_000, 100_000, 1_000_000];

/// Node counts for random generation; cost grows quadratically.
const RANDOM_SIZES: &[usize] = &[500, 2_000, 5_000];

const BRANCHING_FACTOR: f64 = 8.0;

fn empty_graphs(c: &mut Criterion) {
    let workers = available_workers();
    let mut group = c.benchmark_group("empty_graph");

    for &node_count in EMPTY_SIZES {
        let sequential = GenerationBenchParams { node_count, workers: 1 };
        group.bench_with_input(
            BenchmarkId::new("sequential", sequential),
            &node_count,
            |b, &nodes| b.iter(|| black_box(generate::empty(nodes))),
        );
        let parallel = GenerationBenchParams { node_count, workers };
        group.bench_with_input(
            BenchmarkId::new("parallel", parallel),
            &parallel,
            |b, params| {
                b.iter(|| black_box(generate::empty_parallel(params.node_count, params.workers)));
            },
        );
    }

    group.finish();
}

fn ring_graphs(c: &mut Criterion) {
    let workers = available_workers();
    let mut group = c.benchmark_group("ring_graph");

    for &node_count in EMPTY_SIZES {
        group.bench_with_input(
            BenchmarkId::new("sequential", GenerationBenchParams { node_count, workers: 1 }),
            &node_count,
            |b, &nodes| b.iter(|| black_box(generate::ring(nodes))),
        );
        group.bench_with_input(
            BenchmarkId::new("parallel", GenerationBenchParams { node_count, workers }),
            &node_count,
            |b, &nodes| b.iter(|| black_box(generate::ring_parallel(nodes, workers))),
        );
    }

    group.finish();
}

fn random_graphs_impl(c: &mut Criterion) -> Result<(), BenchSetupError> {
    let workers = available_workers();
    let mut group = c.benchmark_group("random_graph");
    group.sample_size(20);

    for &node_count in RANDOM_SIZES {
        let graph_params = RandomGraphParams::new(node_count, BRANCHING_FACTOR)?.with_seed(SEED);

        group.bench_with_input(
            BenchmarkId::new("sequential", GenerationBenchParams { node_count, workers: 1 }),
            &graph_params,
            |b, params| b.iter(|| black_box(generate::random(params))),
        );
        group.bench_with_input(
            BenchmarkId::new("parallel", GenerationBenchParams { node_count, workers }),
            &graph_params,
            |b, params| b.iter(|| black_box(generate::random_parallel(params, workers))),
        );
    }

    group.finish();
    Ok(())
}

fn random_graphs(c: &mut Criterion) {
    if let Err(err) = random_graphs_impl(c) {
        panic!("random_graph benchmark setup failed: {err}");
    }
}

criterion_group!(benches, empty_graphs, ring_graphs, random_graphs);
criterion_main!(benches);
