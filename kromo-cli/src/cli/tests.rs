//! Unit tests for argument parsing, peer list handling and the local command.

use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

use clap::Parser;
use clap::error::ErrorKind;
use kromo_core::{ColoringError, GraphError};
use kromo_net::{DistributedOutcome, NetError, PeerOutcome};
use kromo_test_support::tracing::RecordingLayer;
use rstest::rstest;

use super::commands::run_color;
use super::config::{parse_peer_list, read_peer_file};
use super::test_helpers::{parse, run_cli_expecting_error, temp_dir, write_peer_file};
use super::{
    Cli, CliError, ColorCommand, ColorSummary, Command, CommandSummary, CoordinateCommand,
    CoordinateSummary, Strategy, Topology, render_summary, run_cli,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn color(nodes: usize, topology: Topology, strategy: Strategy) -> ColorCommand {
    ColorCommand {
        nodes,
        topology,
        branching_factor: 4.0,
        workers: Some(2),
        max_color: None,
        strategy,
        seed: 7,
    }
}

fn coordinate(config: std::path::PathBuf) -> CoordinateCommand {
    CoordinateCommand {
        config,
        nodes: 16,
        branching_factor: 3.0,
        seed: 1,
        max_color: None,
        connect_timeout_secs: 1,
        round_timeout_secs: 1,
        completion_timeout_secs: 1,
        max_rounds: 8,
    }
}

#[test]
fn peer_lists_skip_comments_and_blank_lines() {
    let peers = parse_peer_list("# cluster\n\n10.0.0.1:7000\n  \n  # spare\n10.0.0.2:7001\n")
        .expect("list parses");
    assert_eq!(
        peers,
        vec![
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 7000),
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 7001),
        ]
    );
}

#[rstest]
#[case::missing_port("10.0.0.1:7000\n10.0.0.2\n", 2, "10.0.0.2")]
#[case::hostname("# peers\nlocalhost:7000\n", 2, "localhost:7000")]
#[case::port_overflow("\n\n10.0.0.3:70000\n", 3, "10.0.0.3:70000")]
#[case::ipv6("[::1]:7000\n", 1, "[::1]:7000")]
fn malformed_lines_report_their_number(
    #[case] contents: &str,
    #[case] expected_line: usize,
    #[case] expected_value: &str,
) {
    let err = parse_peer_list(contents).expect_err("line is malformed");
    match err {
        CliError::InvalidPeerAddress { line, value, .. } => {
            assert_eq!(line, expected_line);
            assert_eq!(value, expected_value);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
#[case::empty("")]
#[case::comments_only("# nobody yet\n\n   \n")]
fn empty_peer_lists_are_rejected(#[case] contents: &str) {
    let err = parse_peer_list(contents).expect_err("list is empty");
    assert!(matches!(err, CliError::EmptyPeerList));
    assert_eq!(err.code(), "CLI_EMPTY_PEER_LIST");
}

#[test]
fn peer_files_are_read_from_disk() -> TestResult {
    let dir = temp_dir();
    let path = write_peer_file(&dir, "127.0.0.1:9000\n")?;
    let peers = read_peer_file(&path)?;
    assert_eq!(peers, vec![SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9000)]);
    Ok(())
}

#[test]
fn missing_peer_files_are_reported() {
    let dir = temp_dir();
    let path = dir.path().join("absent.conf");
    let err = read_peer_file(&path).expect_err("file is absent");
    assert!(matches!(err, CliError::MissingConfig { path: ref missing } if *missing == path));
    assert_eq!(err.code(), "CLI_MISSING_CONFIG");
}

#[rstest]
#[case::ring(Topology::Ring, 6, 2, 6)]
#[case::complete(Topology::Complete, 5, 5, 10)]
fn sequential_colouring_reports_exact_palettes(
    #[case] topology: Topology,
    #[case] nodes: usize,
    #[case] colors_used: usize,
    #[case] edges: usize,
) -> TestResult {
    let summary = run_color(color(nodes, topology, Strategy::Sequential))?;
    assert_eq!(summary.nodes, nodes);
    assert_eq!(summary.edges, edges);
    assert_eq!(summary.colors_used, colors_used);
    assert_eq!(summary.passes, 1);
    assert!(summary.valid);
    Ok(())
}

#[test]
fn both_strategies_colour_the_same_random_graph() -> TestResult {
    let sequential = run_color(color(200, Topology::Random, Strategy::Sequential))?;
    let parallel = run_color(color(200, Topology::Random, Strategy::Parallel))?;
    assert_eq!(sequential.edges, parallel.edges);
    assert!(sequential.valid && parallel.valid);
    Ok(())
}

#[test]
fn tight_palettes_surface_exhaustion() {
    let mut command = color(4, Topology::Complete, Strategy::Sequential);
    command.max_color = Some(2);
    let err = run_color(command).expect_err("four mutually adjacent nodes need four colours");
    assert!(matches!(
        err,
        CliError::Coloring(ColoringError::ColorsExhausted { max_color: 2, .. })
    ));
    assert_eq!(err.code(), "COLORING_COLORS_EXHAUSTED");
}

#[test]
fn zero_nodes_are_rejected() {
    let err = run_color(color(0, Topology::Ring, Strategy::Sequential)).expect_err("empty ring");
    assert!(matches!(err, CliError::Graph(GraphError::InvalidSize { got: 0 })));
}

#[test]
fn zero_workers_report_the_graph_code() {
    let mut command = color(8, Topology::Ring, Strategy::Parallel);
    command.workers = Some(0);
    let err = run_color(command).expect_err("zero workers");
    assert_eq!(err.code(), "GRAPH_INVALID_WORKER_COUNT");
}

#[test]
fn colour_runs_are_instrumented() -> TestResult {
    let (layer, _guard) = RecordingLayer::install();
    let cli = Cli {
        command: Command::Color(color(6, Topology::Ring, Strategy::Sequential)),
    };
    run_cli(cli)?;

    let run = layer.span("cli.run").expect("cli.run span must exist");
    assert_eq!(run.fields.get("command").map(String::as_str), Some("color"));
    let color = layer.span("cli.color").expect("cli.color span must exist");
    assert_eq!(color.fields.get("topology").map(String::as_str), Some("ring"));
    assert_eq!(color.fields.get("strategy").map(String::as_str), Some("sequential"));
    assert_eq!(
        layer
            .events_matching(tracing::Level::INFO, "local colouring completed")
            .len(),
        1
    );
    Ok(())
}

#[test]
fn coordinate_fails_before_dialling_on_bad_config() -> TestResult {
    let dir = temp_dir();
    let missing = Cli {
        command: Command::Coordinate(coordinate(dir.path().join("absent.conf"))),
    };
    let err = run_cli_expecting_error(missing, "absent config must fail");
    assert!(matches!(err, CliError::MissingConfig { .. }));

    let empty = Cli {
        command: Command::Coordinate(coordinate(write_peer_file(&dir, "# none\n")?)),
    };
    let err = run_cli_expecting_error(empty, "empty config must fail");
    assert!(matches!(err, CliError::EmptyPeerList));
    Ok(())
}

#[test]
fn coordinate_reports_unreachable_peers() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    let dir = temp_dir();
    let path = write_peer_file(&dir, &format!("{addr}\n"))?;
    let cli = Cli {
        command: Command::Coordinate(coordinate(path)),
    };
    let err = run_cli_expecting_error(cli, "nobody listens on a released port");
    assert!(matches!(err, CliError::Net(NetError::Dial { .. })), "unexpected error: {err}");
    assert_eq!(err.code(), "NET_DIAL");
    Ok(())
}

#[test]
fn coordinate_requires_a_config_file() {
    let err = Cli::try_parse_from(["kromo", "coordinate", "--nodes", "10"])
        .expect_err("--config is required");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[rstest]
#[case::unknown_topology(&["kromo", "color", "--nodes", "4", "--topology", "star"])]
#[case::unknown_strategy(&["kromo", "color", "--nodes", "4", "--strategy", "greedy"])]
#[case::empty_palette(&["kromo", "color", "--nodes", "4", "--max-color", "0"])]
#[case::bad_listen(&["kromo", "peer", "--listen", "nowhere"])]
fn clap_rejects_invalid_arguments(#[case] args: &[&str]) {
    assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn arguments_fill_defaults() {
    let color_cli = parse(&["kromo", "color", "--nodes", "12"]);
    let Command::Color(color_args) = color_cli.command else {
        panic!("color subcommand expected");
    };
    assert_eq!(color_args.topology, Topology::Random);
    assert_eq!(color_args.strategy, Strategy::Parallel);
    assert_eq!(color_args.max_color, None);

    let peer_cli = parse(&["kromo", "peer", "--listen", "127.0.0.1:7000", "--workers", "3"]);
    let Command::Peer(peer) = peer_cli.command else {
        panic!("peer subcommand expected");
    };
    assert_eq!(peer.listen.port(), 7000);
    assert_eq!(peer.workers, Some(3));
    assert_eq!(peer.round_timeout_secs, 60);
}

#[test]
fn timeout_flags_default_and_override() {
    let cli = parse(&["kromo", "coordinate", "--config", "peers.conf", "--nodes", "8"]);
    let Command::Coordinate(defaults) = cli.command else {
        panic!("coordinate subcommand expected");
    };
    assert_eq!(defaults.connect_timeout_secs, 10);
    assert_eq!(defaults.round_timeout_secs, 60);
    assert_eq!(defaults.completion_timeout_secs, 60);

    let overridden = parse(&[
        "kromo",
        "coordinate",
        "--config",
        "peers.conf",
        "--nodes",
        "8",
        "--round-timeout-secs",
        "5",
    ]);
    let Command::Coordinate(coordinate) = overridden.command else {
        panic!("coordinate subcommand expected");
    };
    assert_eq!(coordinate.round_timeout_secs, 5);

    let peer_defaults = parse(&["kromo", "peer", "--listen", "127.0.0.1:7000"]);
    let Command::Peer(peer) = peer_defaults.command else {
        panic!("peer subcommand expected");
    };
    assert_eq!(peer.setup_timeout_secs, 30);

    let peer_overridden = parse(&[
        "kromo",
        "peer",
        "--listen",
        "127.0.0.1:7000",
        "--setup-timeout-secs",
        "3",
        "--round-timeout-secs",
        "4",
    ]);
    let Command::Peer(tuned) = peer_overridden.command else {
        panic!("peer subcommand expected");
    };
    assert_eq!(tuned.setup_timeout_secs, 3);
    assert_eq!(tuned.round_timeout_secs, 4);
}

#[test]
fn summaries_render_as_text() -> TestResult {
    let summaries = [
        CommandSummary::Color(ColorSummary {
            topology: Topology::Ring,
            strategy: Strategy::Sequential,
            nodes: 6,
            edges: 6,
            average_degree: 2.0,
            colors_used: 2,
            passes: 1,
            valid: true,
        }),
        CommandSummary::Coordinate(CoordinateSummary {
            nodes: 16,
            edges: 20,
            outcome: DistributedOutcome {
                peers: 3,
                rounds: 2,
                colors_used: 4,
                valid: true,
            },
        }),
        CommandSummary::Peer(PeerOutcome {
            node: 2,
            peers: 3,
            owned_vertices: 5,
            rounds: 2,
        }),
    ];
    let mut buffer = Vec::new();
    for summary in &summaries {
        render_summary(summary, &mut buffer)?;
    }
    let text = String::from_utf8(buffer)?;
    assert!(text.contains("topology: ring"));
    assert!(text.contains("average degree: 2.00"));
    assert!(text.contains("colors used: 2"));
    assert!(text.contains("peers: 3"));
    assert!(text.contains("node: 2 of 3"));
    assert!(text.contains("owned vertices: 5"));
    Ok(())
}
