//! Command-line interface for kromo.
//!
//! `color` generates and colours a graph in-process, `coordinate` drives a
//! distributed run over the peers named in a config file and `peer` serves
//! one member of such a run.

mod commands;
mod config;

pub use commands::{
    Cli, CliError, ColorCommand, ColorSummary, Command, CommandSummary, CoordinateCommand,
    CoordinateSummary, PeerCommand, Strategy, Topology, render_summary, run_cli,
};

#[cfg(test)]
mod test_helpers;
#[cfg(test)]
mod tests;
