//! The peer side of a distributed colouring run.
//!
//! A peer serves exactly one run. The first connection it accepts is the
//! coordinator; later ones are lower-indexed peers. Connection handlers only
//! decode and forward events, and the peer task does the work.

mod local;
mod mesh;

use std::{
    collections::{BTreeMap, BTreeSet},
    net::{SocketAddr, SocketAddrV4},
    num::NonZeroUsize,
    sync::Arc,
    thread,
    time::Duration,
};

use futures::future::try_join_all;
use kromo_core::{GraphError, coloring::color_parallel_subset};
use tokio::{
    net::TcpListener,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::{Instant, sleep_until, timeout},
};
use tracing::{Span, debug, field, info, instrument, warn};

use self::local::LocalGraph;
use crate::{
    conn::NodeConn,
    dispatch::DispatchTable,
    error::{NetError, ProtocolError},
    reporter::{Phase, Reporter},
    wire::{Message, Opcode, Subgraph, VertexColor},
};

const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Vertex colours per `VERTEX_INFO` frame.
const COLORS_PER_FRAME: usize = 1 << 16;

/// Settings for one peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerConfig {
    listen: SocketAddr,
    workers: usize,
    round_timeout: Duration,
    setup_timeout: Duration,
}

impl PeerConfig {
    /// Listens on `listen` with one colouring worker per available core.
    #[must_use]
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            workers: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }

    /// Sets the colouring worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Bounds the wait for other peers' round markers.
    #[must_use]
    pub const fn with_round_timeout(mut self, limit: Duration) -> Self {
        self.round_timeout = limit;
        self
    }

    /// Bounds each setup step after the coordinator connects.
    #[must_use]
    pub const fn with_setup_timeout(mut self, limit: Duration) -> Self {
        self.setup_timeout = limit;
        self
    }

    /// Returns the listen address.
    #[must_use]
    #[rustfmt::skip]
    pub const fn listen(&self) -> SocketAddr { self.listen }

    /// Returns the colouring worker count.
    #[must_use]
    #[rustfmt::skip]
    pub const fn workers(&self) -> usize { self.workers }
}

/// Summary of a peer's part in a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerOutcome {
    /// Index assigned by the coordinator.
    pub node: u8,
    /// Number of peers in the run.
    pub peers: u8,
    /// Vertices this peer owned.
    pub owned_vertices: usize,
    /// Rounds this peer took part in.
    pub rounds: u32,
}

#[derive(Debug)]
enum CoordinatorEvent {
    Assigned { node: u8, total: u8 },
    PeerAddr { node: u8, addr: SocketAddrV4 },
    Share(Subgraph),
    RoundStart(u32),
    Complete,
}

impl CoordinatorEvent {
    fn describe(&self) -> String {
        match self {
            Self::Assigned { .. } => Opcode::NodeIndexCount.to_string(),
            Self::PeerAddr { node, .. } => format!("{} for node {node}", Opcode::NodeIp),
            Self::Share(_) => Opcode::Subgraph.to_string(),
            Self::RoundStart(round) => format!("{} {round}", Opcode::RoundStart),
            Self::Complete => Opcode::ColoringComplete.to_string(),
        }
    }
}

#[derive(Debug)]
enum LinkEvent {
    Colors(Vec<VertexColor>),
    Marker { node: u8, round: u32 },
}

fn unexpected(expected: &'static str, event: &CoordinatorEvent) -> NetError {
    NetError::UnexpectedMessage {
        expected,
        received: event.describe(),
    }
}

fn forward<E>(events: &UnboundedSender<E>, opcode: Opcode, event: E) -> Result<(), ProtocolError> {
    events.send(event).map_err(|_| ProtocolError::Rejected {
        opcode,
        reason: "peer task has stopped".to_owned(),
    })
}

fn coordinator_table(events: &UnboundedSender<CoordinatorEvent>) -> DispatchTable {
    [
        Opcode::NodeIndexCount,
        Opcode::NodeIp,
        Opcode::Subgraph,
        Opcode::RoundStart,
        Opcode::ColoringComplete,
    ]
    .into_iter()
    .fold(DispatchTable::new(), |table, opcode| {
        let sender = events.clone();
        table.on_message(opcode, move |message| {
            let event = match message {
                Message::NodeIndexCount { node, total } => CoordinatorEvent::Assigned { node, total },
                Message::NodeIp { node, addr } => CoordinatorEvent::PeerAddr { node, addr },
                Message::Subgraph(share) => CoordinatorEvent::Share(share),
                Message::RoundStart { round } => CoordinatorEvent::RoundStart(round),
                Message::ColoringComplete => CoordinatorEvent::Complete,
                other => return Err(ProtocolError::Unhandled { opcode: other.opcode() }),
            };
            forward(&sender, opcode, event)
        })
    })
}

fn link_table(events: &UnboundedSender<LinkEvent>) -> DispatchTable {
    let colors = events.clone();
    let markers = events.clone();
    DispatchTable::new()
        .on_message(Opcode::VertexInfo, move |message| match message {
            Message::VertexInfo(entries) => {
                forward(&colors, Opcode::VertexInfo, LinkEvent::Colors(entries))
            }
            other => Err(ProtocolError::Unhandled { opcode: other.opcode() }),
        })
        .on_message(Opcode::NodeRoundFinished, move |message| match message {
            Message::NodeRoundFinished { node, round, .. } => forward(
                &markers,
                Opcode::NodeRoundFinished,
                LinkEvent::Marker { node, round },
            ),
            other => Err(ProtocolError::Unhandled { opcode: other.opcode() }),
        })
}

/// A bound peer waiting for its coordinator.
pub struct PeerNode {
    config: PeerConfig,
    listener: TcpListener,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for PeerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerNode")
            .field("config", &self.config)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

impl PeerNode {
    /// Binds the listen address.
    ///
    /// # Errors
    /// Returns [`NetError::Graph`] for a zero worker count and
    /// [`NetError::Bind`] when the address cannot be bound.
    pub async fn bind(config: PeerConfig, reporter: Arc<dyn Reporter>) -> Result<Self, NetError> {
        if config.workers == 0 {
            return Err(GraphError::InvalidWorkerCount { got: 0 }.into());
        }
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| NetError::Bind {
                addr: config.listen,
                source,
            })?;
        Ok(Self {
            config,
            listener,
            reporter,
        })
    }

    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    ///
    /// # Errors
    /// Returns [`NetError::Bind`] when the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.listener.local_addr().map_err(|source| NetError::Bind {
            addr: self.config.listen,
            source,
        })
    }

    /// Serves one run from the coordinator's first message to completion.
    ///
    /// # Errors
    /// Fails on setup timeouts, protocol violations, lost connections, round
    /// timeouts and local colouring errors such as exhausted palettes.
    #[instrument(
        name = "net.peer.run",
        skip(self),
        fields(listen = %self.config.listen, node = field::Empty),
        err
    )]
    pub async fn run(self) -> Result<PeerOutcome, NetError> {
        let Self {
            config,
            listener,
            reporter,
        } = self;

        reporter.phase(Phase::Connecting);
        let (stream, remote) = listener
            .accept()
            .await
            .map_err(|source| NetError::Accept { source })?;
        stream
            .set_nodelay(true)
            .map_err(|source| NetError::Accept { source })?;
        debug!(%remote, "coordinator connected");
        let (coordinator_tx, mut coordinator_events) = mpsc::unbounded_channel();
        let (closed_tx, closed) = mpsc::unbounded_channel();
        let coordinator = NodeConn::spawn(
            stream,
            0,
            coordinator_table(&coordinator_tx),
            Some(closed_tx.clone()),
        )?;
        drop(coordinator_tx);

        reporter.phase(Phase::IndexExchange);
        let limit = config.setup_timeout;
        let (node, total) = match next_setup_event(&mut coordinator_events, limit, "node index").await? {
            CoordinatorEvent::Assigned { node, total } if (1..=total).contains(&node) => (node, total),
            other => return Err(unexpected("NODE_INDEX_COUNT with a valid index", &other)),
        };
        Span::current().record("node", node);
        let mut higher = BTreeMap::new();
        while higher.len() < usize::from(total - node) {
            match next_setup_event(&mut coordinator_events, limit, "peer addresses").await? {
                CoordinatorEvent::PeerAddr { node: peer, addr } if peer > node && peer <= total => {
                    higher.insert(peer, addr);
                }
                other => return Err(unexpected("NODE_IP for a higher node", &other)),
            }
        }
        let (link_tx, link_events) = mpsc::unbounded_channel();
        let links = timeout(
            limit,
            mesh::connect(&listener, node, &higher, &link_table(&link_tx), &closed_tx),
        )
        .await
        .map_err(|_| NetError::SetupTimeout { stage: "peer mesh" })??;
        drop((link_tx, closed_tx));
        debug!(links = links.len(), "peer mesh connected");

        reporter.phase(Phase::SubgraphDistribution);
        let share = receive_share(&mut coordinator_events, limit, node, total).await?;
        let local = LocalGraph::build(&share, node)?;
        info!(
            owned = local.owned(),
            ghosts = local.ghosts(),
            "subgraph loaded"
        );
        coordinator
            .send(&Message::NodeRoundFinished {
                node,
                round: 0,
                conflicts: 0,
            })
            .await?;

        reporter.phase(Phase::ColoringRounds);
        Session {
            node,
            total,
            config,
            reporter,
            coordinator,
            links,
            local,
            coordinator_events,
            link_events,
            closed,
            markers: BTreeMap::new(),
            closed_links: BTreeSet::new(),
        }
        .serve()
        .await
    }
}

async fn next_setup_event(
    events: &mut UnboundedReceiver<CoordinatorEvent>,
    limit: Duration,
    stage: &'static str,
) -> Result<CoordinatorEvent, NetError> {
    timeout(limit, events.recv())
        .await
        .map_err(|_| NetError::SetupTimeout { stage })?
        .ok_or(NetError::PeerDisconnected { node: 0 })
}

/// Reads `SUBGRAPH` parts until every row `node` owns has arrived.
async fn receive_share(
    events: &mut UnboundedReceiver<CoordinatorEvent>,
    limit: Duration,
    node: u8,
    total: u8,
) -> Result<Subgraph, NetError> {
    let mut share = match next_setup_event(events, limit, "subgraph").await? {
        CoordinatorEvent::Share(share) if share.node_count() == total => share,
        other => return Err(unexpected("SUBGRAPH covering every node", &other)),
    };
    let owned = share.owned_range(node).map_or(0, |range| range.len());
    while share.adjacency().len() < owned {
        match next_setup_event(events, limit, "subgraph").await? {
            CoordinatorEvent::Share(part) => share.append_rows(part)?,
            other => return Err(unexpected("the rest of the SUBGRAPH", &other)),
        }
    }
    Ok(share)
}

async fn send_colors(conn: &NodeConn, colors: &[VertexColor]) -> Result<(), NetError> {
    for chunk in colors.chunks(COLORS_PER_FRAME) {
        conn.send(&Message::VertexInfo(chunk.to_vec())).await?;
    }
    Ok(())
}

/// Round-phase state for one peer.
struct Session {
    node: u8,
    total: u8,
    config: PeerConfig,
    reporter: Arc<dyn Reporter>,
    coordinator: NodeConn,
    links: BTreeMap<u8, NodeConn>,
    local: LocalGraph,
    coordinator_events: UnboundedReceiver<CoordinatorEvent>,
    link_events: UnboundedReceiver<LinkEvent>,
    closed: UnboundedReceiver<u8>,
    markers: BTreeMap<u32, BTreeSet<u8>>,
    closed_links: BTreeSet<u8>,
}

impl Session {
    async fn serve(mut self) -> Result<PeerOutcome, NetError> {
        let mut rounds = 0;
        loop {
            tokio::select! {
                biased;
                Some(node) = self.closed.recv() => self.note_closed(node)?,
                Some(event) = self.link_events.recv() => self.absorb(event)?,
                event = self.coordinator_events.recv() => match event {
                    Some(CoordinatorEvent::RoundStart(round)) => {
                        self.round(round).await?;
                        rounds = round;
                    }
                    Some(CoordinatorEvent::Complete) => return self.finish(rounds).await,
                    Some(other) => {
                        return Err(unexpected("ROUND_START or COLORING_COMPLETE", &other));
                    }
                    None => return Err(NetError::PeerDisconnected { node: 0 }),
                },
            }
        }
    }

    fn note_closed(&mut self, node: u8) -> Result<(), NetError> {
        if node == 0 {
            return Err(NetError::PeerDisconnected { node });
        }
        debug!(peer = node, "peer link closed");
        self.closed_links.insert(node);
        Ok(())
    }

    fn absorb(&mut self, event: LinkEvent) -> Result<(), NetError> {
        match event {
            LinkEvent::Colors(colors) => {
                self.local.apply_remote(&colors)?;
            }
            LinkEvent::Marker { node, round } if self.links.contains_key(&node) => {
                self.markers.entry(round).or_default().insert(node);
            }
            LinkEvent::Marker { node, round } => {
                warn!(peer = node, round, "ignoring round marker from an unknown node");
            }
        }
        Ok(())
    }

    async fn round(&mut self, round: u32) -> Result<(), NetError> {
        if let Some(&node) = self.closed_links.first() {
            return Err(NetError::PeerDisconnected { node });
        }

        let colored = self.local.pending().to_vec();
        if !colored.is_empty()
            && let Some(graph) = self.local.graph()
        {
            let subset = colored.clone();
            let max_color = self.local.max_color();
            let workers = self.config.workers;
            let report = tokio::task::spawn_blocking(move || {
                color_parallel_subset(&graph, &subset, max_color, workers)
            })
            .await
            .map_err(|error| NetError::Task {
                message: error.to_string(),
            })??;
            debug!(round, passes = report.passes(), "local colouring done");
        }

        for (owner, colors) in self.local.boundary_updates(&colored) {
            let link = self
                .links
                .get(&owner)
                .ok_or(NetError::PeerDisconnected { node: owner })?;
            send_colors(link, &colors).await?;
        }
        let marker = Message::NodeRoundFinished {
            node: self.node,
            round,
            conflicts: 0,
        };
        try_join_all(self.links.values().map(|link| link.send(&marker))).await?;

        self.await_markers(round).await?;
        let resets = self.local.resolve_conflicts(&colored)?;
        debug!(round, coloured = colored.len(), resets, "round resolved");
        self.reporter.round_finished(round, u64::from(resets));
        self.coordinator
            .send(&Message::NodeRoundFinished {
                node: self.node,
                round,
                conflicts: resets,
            })
            .await
    }

    async fn await_markers(&mut self, round: u32) -> Result<(), NetError> {
        let deadline = Instant::now() + self.config.round_timeout;
        let expected = self.links.len();
        while self.markers.get(&round).map_or(0, BTreeSet::len) < expected {
            tokio::select! {
                biased;
                Some(node) = self.closed.recv() => {
                    let marked = self.markers.get(&round).is_some_and(|seen| seen.contains(&node));
                    if node == 0 || !marked {
                        return Err(NetError::PeerDisconnected { node });
                    }
                    self.closed_links.insert(node);
                }
                Some(event) = self.link_events.recv() => self.absorb(event)?,
                () = sleep_until(deadline) => return Err(NetError::RoundTimeout { round }),
            }
        }
        self.markers.remove(&round);
        Ok(())
    }

    async fn finish(self, rounds: u32) -> Result<PeerOutcome, NetError> {
        self.reporter.phase(Phase::Complete);
        send_colors(&self.coordinator, &self.local.owned_colors()).await?;
        self.coordinator
            .send(&Message::NodeFinished { node: self.node })
            .await?;
        self.reporter.peer_finished(self.node);
        info!(rounds, "peer finished");
        Ok(PeerOutcome {
            node: self.node,
            peers: self.total,
            owned_vertices: self.local.owned(),
            rounds,
        })
    }
}
