//! Command implementations and argument parsing for the kromo CLI.

use std::{
    io::{self, Write},
    net::{AddrParseError, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use kromo_core::{
    Color, ColoringBuilder, ColoringError, ColoringStrategy, Graph, GraphError,
    generate::{self, DEFAULT_SEED, RandomGraphParams},
};
use kromo_net::{
    Coordinator, CoordinatorConfig, DEFAULT_MAX_ROUNDS, DistributedOutcome, NetError, PeerConfig,
    PeerNode, PeerOutcome, TracingReporter,
};
use thiserror::Error;
use tokio::runtime::{self, Runtime};
use tracing::{Span, field, info, instrument};

use super::config::read_peer_file;

const DEFAULT_BRANCHING_FACTOR: f64 = 8.0;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_ROUND_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SETUP_TIMEOUT_SECS: u64 = 30;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "kromo", about = "Colour graphs locally or across a set of peers.")]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Generate a graph and colour it in this process.
    Color(ColorCommand),
    /// Drive a distributed colouring over the peers listed in a config file.
    Coordinate(CoordinateCommand),
    /// Serve as one peer of a distributed colouring.
    Peer(PeerCommand),
}

/// Graph shapes the `color` command can generate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Topology {
    /// Every pair of nodes is adjacent.
    Complete,
    /// A single cycle through all nodes.
    Ring,
    /// Independent edges with probability derived from the branching factor.
    Random,
}

impl Topology {
    /// Returns the name used on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Ring => "ring",
            Self::Random => "random",
        }
    }
}

/// Colouring engine selected on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Strategy {
    /// Greedy colouring on the calling thread.
    Sequential,
    /// Optimistic greedy colouring across a worker pool.
    Parallel,
}

impl Strategy {
    /// Returns the name used on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

impl From<Strategy> for ColoringStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Sequential => Self::Sequential,
            Strategy::Parallel => Self::Parallel,
        }
    }
}

/// Options accepted by the `color` command.
#[derive(Debug, Args, Clone, Copy)]
pub struct ColorCommand {
    /// Number of nodes to generate.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub nodes: usize,

    /// Shape of the generated graph.
    #[arg(long, value_enum, default_value_t = Topology::Random)]
    pub topology: Topology,

    /// Expected neighbours per node for random graphs.
    #[arg(long = "branching-factor", default_value_t = DEFAULT_BRANCHING_FACTOR)]
    pub branching_factor: f64,

    /// Worker threads for parallel generation and colouring.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Palette size; defaults to one colour per node.
    #[arg(long = "max-color", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_color: Option<Color>,

    /// Colouring engine to run.
    #[arg(long, value_enum, default_value_t = Strategy::Parallel)]
    pub strategy: Strategy,

    /// Seed for random graph generation.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

/// Options accepted by the `coordinate` command.
#[derive(Debug, Args, Clone)]
pub struct CoordinateCommand {
    /// File listing one `IPv4:port` peer address per line.
    #[arg(long)]
    pub config: PathBuf,

    /// Number of nodes in the generated random graph.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub nodes: usize,

    /// Expected neighbours per node.
    #[arg(long = "branching-factor", default_value_t = DEFAULT_BRANCHING_FACTOR)]
    pub branching_factor: f64,

    /// Seed for random graph generation.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Palette size; defaults to one colour per node.
    #[arg(long = "max-color", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_color: Option<Color>,

    /// Seconds allowed for each peer connection attempt.
    #[arg(long = "connect-timeout-secs", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// Seconds allowed for every peer to report each colouring round.
    #[arg(long = "round-timeout-secs", default_value_t = DEFAULT_ROUND_TIMEOUT_SECS)]
    pub round_timeout_secs: u64,

    /// Seconds allowed for peers to return their colours after the last round.
    #[arg(long = "completion-timeout-secs", default_value_t = DEFAULT_COMPLETION_TIMEOUT_SECS)]
    pub completion_timeout_secs: u64,

    /// Upper bound on colouring rounds.
    #[arg(long = "max-rounds", default_value_t = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: u32,
}

/// Options accepted by the `peer` command.
#[derive(Debug, Args, Clone, Copy)]
pub struct PeerCommand {
    /// Address to accept the coordinator and lower peers on.
    #[arg(long)]
    pub listen: SocketAddr,

    /// Worker threads for local colouring.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Seconds allowed for round markers from other peers.
    #[arg(long = "round-timeout-secs", default_value_t = DEFAULT_ROUND_TIMEOUT_SECS)]
    pub round_timeout_secs: u64,

    /// Seconds allowed for the coordinator to connect and for the peer mesh
    /// to form.
    #[arg(long = "setup-timeout-secs", default_value_t = DEFAULT_SETUP_TIMEOUT_SECS)]
    pub setup_timeout_secs: u64,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Graph generation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// Local colouring failed.
    #[error(transparent)]
    Coloring(#[from] ColoringError),
    /// A distributed run failed.
    #[error(transparent)]
    Net(#[from] NetError),
    /// The peer list file does not exist.
    #[error("peer list `{path}` does not exist")]
    MissingConfig {
        /// Path that was looked up.
        path: PathBuf,
    },
    /// The peer list file names no peers.
    #[error("peer list names no peers")]
    EmptyPeerList,
    /// A peer list line is not an `IPv4:port` pair.
    #[error("line {line}: `{value}` is not an IPv4:port address: {source}")]
    InvalidPeerAddress {
        /// One-based line number.
        line: usize,
        /// The offending text, trimmed.
        value: String,
        /// Parser failure.
        #[source]
        source: AddrParseError,
    },
    /// Reading a file failed.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The async runtime could not start.
    #[error("failed to start async runtime: {source}")]
    Runtime {
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// A run finished but left the graph improperly coloured.
    #[error("colouring finished but is not valid")]
    InvalidColoring,
}

impl CliError {
    /// Returns a stable, machine-readable code for logging.
    ///
    /// Graph failures wrapped by the colouring engine report the graph code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Graph(err) => err.code().as_str(),
            Self::Coloring(err) => err
                .graph_code()
                .map_or_else(|| err.code().as_str(), |code| code.as_str()),
            Self::Net(err) => err.code().as_str(),
            Self::MissingConfig { .. } => "CLI_MISSING_CONFIG",
            Self::EmptyPeerList => "CLI_EMPTY_PEER_LIST",
            Self::InvalidPeerAddress { .. } => "CLI_INVALID_PEER_ADDRESS",
            Self::Io { .. } => "CLI_IO",
            Self::Runtime { .. } => "CLI_RUNTIME",
            Self::InvalidColoring => "CLI_INVALID_COLORING",
        }
    }
}

/// Result of a local colouring.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorSummary {
    /// Generated shape.
    pub topology: Topology,
    /// Engine that coloured it.
    pub strategy: Strategy,
    /// Node count.
    pub nodes: usize,
    /// Undirected edge count.
    pub edges: usize,
    /// Mean neighbours per node.
    pub average_degree: f64,
    /// Distinct colours assigned.
    pub colors_used: usize,
    /// Colouring passes the engine ran.
    pub passes: usize,
    /// Whether every node is coloured and no edge joins equal colours.
    pub valid: bool,
}

/// Result of a coordinated run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateSummary {
    /// Node count of the generated graph.
    pub nodes: usize,
    /// Undirected edge count.
    pub edges: usize,
    /// What the coordinator reported.
    pub outcome: DistributedOutcome,
}

/// Summarises the outcome of executing a CLI command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandSummary {
    /// Output of `color`.
    Color(ColorSummary),
    /// Output of `coordinate`.
    Coordinate(CoordinateSummary),
    /// Output of `peer`.
    Peer(PeerOutcome),
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when configuration or execution fails.
///
/// # Examples
/// ```
/// use kromo_cli::cli::{Cli, CommandSummary, run_cli};
/// use clap::Parser;
///
/// let cli = Cli::parse_from(["kromo", "color", "--nodes", "6", "--topology", "ring"]);
/// let CommandSummary::Color(summary) = run_cli(cli).expect("ring colours") else {
///     panic!("color returns a colour summary");
/// };
/// assert_eq!(summary.colors_used, 2);
/// assert!(summary.valid);
/// ```
#[instrument(name = "cli.run", err, skip(cli), fields(command = field::Empty))]
pub fn run_cli(cli: Cli) -> Result<CommandSummary, CliError> {
    let span = Span::current();
    match cli.command {
        Command::Color(command) => {
            span.record("command", field::display("color"));
            run_color(command).map(CommandSummary::Color)
        }
        Command::Coordinate(command) => {
            span.record("command", field::display("coordinate"));
            run_coordinate(command).map(CommandSummary::Coordinate)
        }
        Command::Peer(command) => {
            span.record("command", field::display("peer"));
            run_peer(command).map(CommandSummary::Peer)
        }
    }
}

#[instrument(
    name = "cli.color",
    err,
    skip(command),
    fields(
        nodes = command.nodes,
        topology = command.topology.as_str(),
        strategy = command.strategy.as_str(),
    ),
)]
pub(super) fn run_color(command: ColorCommand) -> Result<ColorSummary, CliError> {
    let mut builder = ColoringBuilder::new().with_strategy(command.strategy.into());
    if let Some(max_color) = command.max_color {
        builder = builder.with_max_color(max_color);
    }
    if let Some(workers) = command.workers {
        builder = builder.with_workers(workers);
    }
    let colorer = builder.build()?;

    let workers = colorer.workers();
    let graph = match (command.topology, command.strategy) {
        (Topology::Complete, Strategy::Sequential) => generate::complete(command.nodes)?,
        (Topology::Complete, Strategy::Parallel) => {
            generate::complete_parallel(command.nodes, workers)?
        }
        (Topology::Ring, Strategy::Sequential) => generate::ring(command.nodes)?,
        (Topology::Ring, Strategy::Parallel) => generate::ring_parallel(command.nodes, workers)?,
        (Topology::Random, strategy) => {
            let params = RandomGraphParams::new(command.nodes, command.branching_factor)?
                .with_seed(command.seed);
            match strategy {
                Strategy::Sequential => generate::random(&params)?,
                Strategy::Parallel => generate::random_parallel(&params, workers)?,
            }
        }
    };

    let report = colorer.color(&graph)?;
    let valid = graph.check_valid_coloring();
    if !valid {
        return Err(CliError::InvalidColoring);
    }
    info!(
        colors_used = report.colors_used(),
        passes = report.passes(),
        "local colouring completed"
    );
    Ok(ColorSummary {
        topology: command.topology,
        strategy: command.strategy,
        nodes: graph.len(),
        edges: graph.edge_count(),
        average_degree: graph.average_degree(),
        colors_used: report.colors_used(),
        passes: report.passes(),
        valid,
    })
}

#[instrument(
    name = "cli.coordinate",
    err,
    skip(command),
    fields(config = field::Empty, nodes = command.nodes, peers = field::Empty),
)]
pub(super) fn run_coordinate(command: CoordinateCommand) -> Result<CoordinateSummary, CliError> {
    let CoordinateCommand {
        config,
        nodes,
        branching_factor,
        seed,
        max_color,
        connect_timeout_secs,
        round_timeout_secs,
        completion_timeout_secs,
        max_rounds,
    } = command;
    let span = Span::current();
    span.record("config", field::display(config.display()));

    let peers = read_peer_file(&config)?;
    span.record("peers", peers.len());

    let params = RandomGraphParams::new(nodes, branching_factor)?.with_seed(seed);
    let graph = generate::random(&params)?;
    let coordinator_config = CoordinatorConfig::new(peers)
        .with_max_color(max_color)
        .with_connect_timeout(Duration::from_secs(connect_timeout_secs))
        .with_round_timeout(Duration::from_secs(round_timeout_secs))
        .with_completion_timeout(Duration::from_secs(completion_timeout_secs))
        .with_max_rounds(max_rounds);
    let coordinator = Coordinator::new(coordinator_config, Arc::new(TracingReporter));

    let outcome = build_runtime()?.block_on(coordinator.run(&graph))?;
    if !outcome.valid {
        return Err(CliError::InvalidColoring);
    }
    Ok(summarise(&graph, outcome))
}

fn summarise(graph: &Graph, outcome: DistributedOutcome) -> CoordinateSummary {
    CoordinateSummary {
        nodes: graph.len(),
        edges: graph.edge_count(),
        outcome,
    }
}

#[instrument(name = "cli.peer", err, skip(command), fields(listen = %command.listen))]
pub(super) fn run_peer(command: PeerCommand) -> Result<PeerOutcome, CliError> {
    let mut config = PeerConfig::new(command.listen)
        .with_round_timeout(Duration::from_secs(command.round_timeout_secs))
        .with_setup_timeout(Duration::from_secs(command.setup_timeout_secs));
    if let Some(workers) = command.workers {
        config = config.with_workers(workers);
    }
    let outcome = build_runtime()?.block_on(async {
        let peer = PeerNode::bind(config, Arc::new(TracingReporter)).await?;
        peer.run().await
    })?;
    Ok(outcome)
}

fn build_runtime() -> Result<Runtime, CliError> {
    runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| CliError::Runtime { source })
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_summary(summary: &CommandSummary, mut writer: impl Write) -> io::Result<()> {
    match summary {
        CommandSummary::Color(color) => {
            writeln!(writer, "topology: {}", color.topology.as_str())?;
            writeln!(writer, "strategy: {}", color.strategy.as_str())?;
            writeln!(writer, "nodes: {}", color.nodes)?;
            writeln!(writer, "edges: {}", color.edges)?;
            writeln!(writer, "average degree: {:.2}", color.average_degree)?;
            writeln!(writer, "colors used: {}", color.colors_used)?;
            writeln!(writer, "passes: {}", color.passes)?;
            writeln!(writer, "valid: {}", color.valid)?;
        }
        CommandSummary::Coordinate(run) => {
            writeln!(writer, "nodes: {}", run.nodes)?;
            writeln!(writer, "edges: {}", run.edges)?;
            writeln!(writer, "peers: {}", run.outcome.peers)?;
            writeln!(writer, "rounds: {}", run.outcome.rounds)?;
            writeln!(writer, "colors used: {}", run.outcome.colors_used)?;
            writeln!(writer, "valid: {}", run.outcome.valid)?;
        }
        CommandSummary::Peer(peer) => {
            writeln!(writer, "node: {} of {}", peer.node, peer.peers)?;
            writeln!(writer, "owned vertices: {}", peer.owned_vertices)?;
            writeln!(writer, "rounds: {}", peer.rounds)?;
        }
    }
    Ok(())
}
