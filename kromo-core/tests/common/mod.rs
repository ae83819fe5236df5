use kromo_core::{
    Graph,
    generate::{self, RandomGraphParams},
};

/// Every generator variant under test, keyed by a short label.
#[derive(Clone, Copy, Debug)]
pub enum Topology {
    Complete,
    CompleteParallel,
    Ring,
    RingParallel,
    Random,
    RandomParallel,
}

impl Topology {
    pub const ALL: [Self; 6] = [
        Self::Complete,
        Self::CompleteParallel,
        Self::Ring,
        Self::RingParallel,
        Self::Random,
        Self::RandomParallel,
    ];

    pub fn build(self, nodes: usize, branching_factor: f64, seed: u64) -> Graph {
        let params = || {
            RandomGraphParams::new(nodes, branching_factor)
                .expect("params are valid")
                .with_seed(seed)
        };
        match self {
            Self::Complete => generate::complete(nodes),
            Self::CompleteParallel => generate::complete_parallel(nodes, 3),
            Self::Ring => generate::ring(nodes),
            Self::RingParallel => generate::ring_parallel(nodes, 3),
            Self::Random => generate::random(&params()),
            Self::RandomParallel => generate::random_parallel(&params(), 4),
        }
        .expect("graph must build")
    }
}
