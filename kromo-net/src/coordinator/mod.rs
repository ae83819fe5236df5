//! Drives a distributed colouring run from the coordinating process.
//!
//! A run walks through the [`Phase`] sequence once: dial every peer, assign
//! indices and describe the mesh, ship subgraphs, run rounds until a round
//! ends without conflicts, then wait for every peer's final colours behind a
//! [`CompletionGate`].

mod subgraphs;

use std::{
    collections::BTreeSet,
    io,
    net::{SocketAddr, SocketAddrV4},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use futures::future::try_join_all;
use kromo_core::{Color, Graph};
use tokio::{
    net::TcpStream,
    sync::mpsc,
    time::{Instant, sleep_until, timeout},
};
use tracing::{debug, info, instrument};

use self::subgraphs::{ROW_BYTES_PER_FRAME, build_subgraphs};
use crate::{
    conn::NodeConn,
    dispatch::DispatchTable,
    error::{NetError, ProtocolError},
    gate::CompletionGate,
    registry::{ConnectionRegistry, Peer},
    reporter::{Phase, Reporter},
    wire::{Message, Opcode},
};

/// Rounds allowed before a run is abandoned.
pub const DEFAULT_MAX_ROUNDS: u32 = 256;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for one coordination run.
///
/// # Examples
/// ```
/// use std::{net::SocketAddrV4, time::Duration};
///
/// use kromo_net::CoordinatorConfig;
///
/// let peer: SocketAddrV4 = "127.0.0.1:7400".parse().expect("valid address");
/// let config = CoordinatorConfig::new(vec![peer])
///     .with_max_color(Some(16))
///     .with_round_timeout(Duration::from_secs(5));
/// assert_eq!(config.peers(), &[peer]);
/// assert_eq!(config.max_color(), Some(16));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    peers: Vec<SocketAddrV4>,
    max_color: Option<Color>,
    connect_timeout: Duration,
    round_timeout: Duration,
    completion_timeout: Duration,
    max_rounds: u32,
}

impl CoordinatorConfig {
    /// Creates a configuration for `peers`, in pre-registration order.
    #[must_use]
    pub const fn new(peers: Vec<SocketAddrV4>) -> Self {
        Self {
            peers,
            max_color: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Sets the palette size; `None` uses the graph's vertex count.
    #[must_use]
    pub const fn with_max_color(mut self, max_color: Option<Color>) -> Self {
        self.max_color = max_color;
        self
    }

    /// Bounds each dial.
    #[must_use]
    pub const fn with_connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = limit;
        self
    }

    /// Bounds the wait for every peer's report in each round.
    #[must_use]
    pub const fn with_round_timeout(mut self, limit: Duration) -> Self {
        self.round_timeout = limit;
        self
    }

    /// Bounds the wait for every peer to finish.
    #[must_use]
    pub const fn with_completion_timeout(mut self, limit: Duration) -> Self {
        self.completion_timeout = limit;
        self
    }

    /// Caps the number of colouring rounds.
    #[must_use]
    pub const fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Returns the configured peer addresses.
    #[must_use]
    pub fn peers(&self) -> &[SocketAddrV4] {
        &self.peers
    }

    /// Returns the explicit palette size, if any.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max_color(&self) -> Option<Color> { self.max_color }

    /// Returns the round cap.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max_rounds(&self) -> u32 { self.max_rounds }

    fn validate(&self, graph: &Graph) -> Result<(u8, Color), NetError> {
        if self.peers.is_empty() {
            return Err(NetError::NoPeers);
        }
        let peers = u8::try_from(self.peers.len()).map_err(|_| NetError::TooManyPeers {
            got: self.peers.len(),
        })?;
        let nodes = u32::try_from(graph.len()).map_err(|_| NetError::GraphTooLarge {
            nodes: graph.len(),
        })?;
        Ok((peers, self.max_color.unwrap_or(nodes)))
    }
}

/// Result of a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DistributedOutcome {
    /// Registered peers.
    pub peers: usize,
    /// Colouring rounds executed, excluding the readiness report.
    pub rounds: u32,
    /// Distinct colours in the final colouring.
    pub colors_used: usize,
    /// Whether the collected colouring is complete and proper.
    pub valid: bool,
}

#[derive(Clone, Copy, Debug)]
struct RoundReport {
    node: u8,
    round: u32,
    conflicts: u32,
}

/// Coordinates a fixed peer set through one colouring run.
pub struct Coordinator {
    config: CoordinatorConfig,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct Channels {
    rounds: mpsc::UnboundedReceiver<RoundReport>,
    closed: mpsc::UnboundedReceiver<u8>,
}

impl Coordinator {
    /// Creates a coordinator that reports progress to `reporter`.
    #[must_use]
    pub const fn new(config: CoordinatorConfig, reporter: Arc<dyn Reporter>) -> Self {
        Self { config, reporter }
    }

    /// Colours `graph` across the configured peers and writes the collected
    /// colours back into it.
    ///
    /// # Errors
    /// Fails on configuration problems, any dial failure, protocol
    /// violations, a disconnected peer, round or completion timeouts, and
    /// when the round cap is exceeded.
    #[instrument(
        name = "net.coordinator.run",
        skip(self, graph),
        fields(nodes = graph.len(), peers = self.config.peers.len()),
        err
    )]
    pub async fn run(&self, graph: &Graph) -> Result<DistributedOutcome, NetError> {
        let (peer_count, max_color) = self.config.validate(graph)?;
        let colors = Arc::new(Mutex::new(vec![None; graph.len()]));
        let gate = Arc::new(CompletionGate::new(usize::from(peer_count)));
        let (rounds_tx, rounds) = mpsc::unbounded_channel();
        let (closed_tx, closed) = mpsc::unbounded_channel();
        let mut channels = Channels { rounds, closed };
        let table = self.dispatch_table(peer_count, &colors, &gate, rounds_tx);

        self.reporter.phase(Phase::Connecting);
        let registry = ConnectionRegistry::new();
        for &addr in &self.config.peers {
            let stream = self.dial(addr).await?;
            registry.add_unregistered(NodeConn::spawn(
                stream,
                0,
                table.clone(),
                Some(closed_tx.clone()),
            )?)?;
        }
        drop(closed_tx);

        self.reporter.phase(Phase::IndexExchange);
        registry.register()?;
        let peers = registry.registered()?;
        for peer in &peers {
            let node = peer.index();
            peer.send(&Message::NodeIndexCount {
                node,
                total: peer_count,
            })
            .await?;
            for (position, &addr) in self.config.peers.iter().enumerate().skip(usize::from(node)) {
                let higher = u8::try_from(position + 1).map_err(|_| NetError::TooManyPeers {
                    got: self.config.peers.len(),
                })?;
                peer.send(&Message::NodeIp { node: higher, addr }).await?;
            }
        }

        self.reporter.phase(Phase::SubgraphDistribution);
        let shares = build_subgraphs(graph, peers.len(), max_color)?;
        for (peer, share) in peers.iter().zip(shares) {
            let parts = share.split_rows(ROW_BYTES_PER_FRAME);
            debug!(node = peer.index(), parts = parts.len(), "sending subgraph");
            for part in parts {
                peer.send(&Message::Subgraph(part)).await?;
            }
        }

        self.reporter.phase(Phase::ColoringRounds);
        self.collect_round(0, peers.len(), &mut channels).await?;
        let mut round = 0;
        loop {
            round += 1;
            if round > self.config.max_rounds {
                return Err(NetError::RoundLimitExceeded {
                    max_rounds: self.config.max_rounds,
                });
            }
            broadcast(&peers, &Message::RoundStart { round }).await?;
            let conflicts = self.collect_round(round, peers.len(), &mut channels).await?;
            self.reporter.round_finished(round, conflicts);
            if conflicts == 0 {
                break;
            }
        }

        self.reporter.phase(Phase::Complete);
        broadcast(&peers, &Message::ColoringComplete).await?;
        self.await_completion(&gate, &mut channels).await?;

        let collected = colors.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for (vertex, color) in collected.into_iter().enumerate() {
            graph.set_color(vertex, color)?;
        }
        drop(peers);
        registry.shutdown()?;

        let outcome = DistributedOutcome {
            peers: usize::from(peer_count),
            rounds: round,
            colors_used: graph.colors_used(),
            valid: graph.check_valid_coloring(),
        };
        info!(
            rounds = outcome.rounds,
            colors_used = outcome.colors_used,
            valid = outcome.valid,
            "distributed colouring complete"
        );
        Ok(outcome)
    }

    fn dispatch_table(
        &self,
        peer_count: u8,
        colors: &Arc<Mutex<Vec<Option<Color>>>>,
        gate: &Arc<CompletionGate>,
        rounds: mpsc::UnboundedSender<RoundReport>,
    ) -> DispatchTable {
        let known = move |opcode: Opcode, node: u8| {
            if (1..=peer_count).contains(&node) {
                Ok(())
            } else {
                Err(ProtocolError::Rejected {
                    opcode,
                    reason: format!("node {node} is not registered"),
                })
            }
        };

        let sink = Arc::clone(colors);
        let finished = Arc::clone(gate);
        let reporter = Arc::clone(&self.reporter);
        DispatchTable::new()
            .on_message(Opcode::VertexInfo, move |message| {
                let Message::VertexInfo(entries) = message else {
                    return Ok(());
                };
                let mut slots = sink.lock().unwrap_or_else(PoisonError::into_inner);
                let len = slots.len();
                for entry in entries {
                    let slot = usize::try_from(entry.vertex)
                        .ok()
                        .and_then(|vertex| slots.get_mut(vertex))
                        .ok_or_else(|| ProtocolError::Rejected {
                            opcode: Opcode::VertexInfo,
                            reason: format!("vertex {} is outside a graph of {len}", entry.vertex),
                        })?;
                    *slot = Some(entry.color);
                }
                Ok(())
            })
            .on_message(Opcode::NodeFinished, move |message| {
                let Message::NodeFinished { node } = message else {
                    return Ok(());
                };
                known(Opcode::NodeFinished, node)?;
                if finished.arrive(node) {
                    reporter.peer_finished(node);
                }
                Ok(())
            })
            .on_message(Opcode::NodeRoundFinished, move |message| {
                let Message::NodeRoundFinished {
                    node,
                    round,
                    conflicts,
                } = message
                else {
                    return Ok(());
                };
                known(Opcode::NodeRoundFinished, node)?;
                rounds
                    .send(RoundReport {
                        node,
                        round,
                        conflicts,
                    })
                    .map_err(|_| ProtocolError::Rejected {
                        opcode: Opcode::NodeRoundFinished,
                        reason: "round collector has stopped".to_owned(),
                    })
            })
    }

    async fn dial(&self, addr: SocketAddrV4) -> Result<TcpStream, NetError> {
        let target = SocketAddr::V4(addr);
        let stream = timeout(self.config.connect_timeout, TcpStream::connect(target))
            .await
            .map_err(|_| NetError::Dial {
                addr: target,
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            })?
            .map_err(|source| NetError::Dial {
                addr: target,
                source,
            })?;
        stream.set_nodelay(true).map_err(|source| NetError::Dial {
            addr: target,
            source,
        })?;
        debug!(%addr, "connected to peer");
        Ok(stream)
    }

    /// Collects one report per peer for `round` and sums their conflicts.
    async fn collect_round(
        &self,
        round: u32,
        peers: usize,
        channels: &mut Channels,
    ) -> Result<u64, NetError> {
        let deadline = Instant::now() + self.config.round_timeout;
        let mut reported = BTreeSet::new();
        let mut conflicts = 0_u64;
        while reported.len() < peers {
            tokio::select! {
                () = sleep_until(deadline) => return Err(NetError::RoundTimeout { round }),
                Some(node) = channels.closed.recv() => {
                    return Err(NetError::PeerDisconnected { node });
                }
                next = channels.rounds.recv() => {
                    let Some(report) = next else {
                        return Err(NetError::CoordinationAborted {
                            reason: "round reports stopped".to_owned(),
                        });
                    };
                    if report.round != round || !reported.insert(report.node) {
                        debug!(node = report.node, round = report.round, expected = round, "ignoring stale round report");
                        continue;
                    }
                    conflicts += u64::from(report.conflicts);
                }
            }
        }
        Ok(conflicts)
    }

    async fn await_completion(
        &self,
        gate: &CompletionGate,
        channels: &mut Channels,
    ) -> Result<(), NetError> {
        let deadline = Instant::now() + self.config.completion_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::select! {
                outcome = gate.wait(remaining) => return outcome,
                Some(node) = channels.closed.recv() => {
                    if !gate.has_arrived(node) {
                        gate.fail(format!("node {node} disconnected before finishing"));
                        return Err(NetError::PeerDisconnected { node });
                    }
                }
            }
        }
    }
}

async fn broadcast(peers: &[Arc<NodeConn>], message: &Message) -> Result<(), NetError> {
    try_join_all(peers.iter().map(|peer| peer.send(message))).await?;
    Ok(())
}
