//! Progress reporting for coordinators and peers.

use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use tracing::info;

/// Coordination phases in the order a run passes through them.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Phase {
    /// Dialling peers or waiting for the coordinator.
    Connecting,
    /// Assigning indices and wiring the peer mesh.
    IndexExchange,
    /// Shipping or loading subgraphs.
    SubgraphDistribution,
    /// Running colouring rounds.
    ColoringRounds,
    /// Collecting results.
    Complete,
}

impl Phase {
    /// Returns the stable upper-case phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::IndexExchange => "INDEX_EXCHANGE",
            Self::SubgraphDistribution => "SUBGRAPH_DISTRIBUTION",
            Self::ColoringRounds => "COLORING_ROUNDS",
            Self::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress notices from a coordinator or peer.
///
/// A reporter is passed in at construction; the libraries hold no global
/// logging state of their own.
pub trait Reporter: Send + Sync {
    /// A new phase began.
    fn phase(&self, phase: Phase);

    /// Round `round` finished with `conflicts` vertices returned to pending.
    fn round_finished(&self, round: u32, conflicts: u64);

    /// Node `node` finished all work.
    fn peer_finished(&self, node: u8);
}

/// Forwards every notice to `tracing` at `info`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn phase(&self, phase: Phase) {
        info!(phase = phase.as_str(), "entering phase");
    }

    fn round_finished(&self, round: u32, conflicts: u64) {
        info!(round, conflicts, "round finished");
    }

    fn peer_finished(&self, node: u8) {
        info!(node, "node finished");
    }
}

/// One notice captured by a [`RecordingReporter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Report {
    /// See [`Reporter::phase`].
    Phase(Phase),
    /// See [`Reporter::round_finished`].
    RoundFinished {
        /// Round number.
        round: u32,
        /// Vertices reset in that round.
        conflicts: u64,
    },
    /// See [`Reporter::peer_finished`].
    PeerFinished(u8),
}

/// Keeps every notice in memory for later inspection.
///
/// # Examples
/// ```
/// use kromo_net::{Phase, RecordingReporter, Report, Reporter};
///
/// let reporter = RecordingReporter::default();
/// reporter.phase(Phase::Connecting);
/// reporter.peer_finished(2);
/// assert_eq!(reporter.phases(), vec![Phase::Connecting]);
/// assert_eq!(reporter.reports().last(), Some(&Report::PeerFinished(2)));
/// ```
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    fn push(&self, report: Report) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
    }

    /// Returns every notice in arrival order.
    #[must_use]
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns only the phase transitions.
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        self.reports()
            .into_iter()
            .filter_map(|report| match report {
                Report::Phase(phase) => Some(phase),
                _ => None,
            })
            .collect()
    }

    /// Returns the `(round, conflicts)` summaries.
    #[must_use]
    pub fn rounds(&self) -> Vec<(u32, u64)> {
        self.reports()
            .into_iter()
            .filter_map(|report| match report {
                Report::RoundFinished { round, conflicts } => Some((round, conflicts)),
                _ => None,
            })
            .collect()
    }

    /// Returns the finished nodes, sorted.
    #[must_use]
    pub fn finished_peers(&self) -> Vec<u8> {
        let mut nodes: Vec<u8> = self
            .reports()
            .into_iter()
            .filter_map(|report| match report {
                Report::PeerFinished(node) => Some(node),
                _ => None,
            })
            .collect();
        nodes.sort_unstable();
        nodes
    }
}

impl Reporter for RecordingReporter {
    fn phase(&self, phase: Phase) {
        self.push(Report::Phase(phase));
    }

    fn round_finished(&self, round: u32, conflicts: u64) {
        self.push(Report::RoundFinished { round, conflicts });
    }

    fn peer_finished(&self, node: u8) {
        self.push(Report::PeerFinished(node));
    }
}
