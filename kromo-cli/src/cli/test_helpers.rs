//! Small helpers shared across CLI tests.

use std::{fs, io, path::PathBuf};

use tempfile::TempDir;

use super::{Cli, CliError, run_cli};

pub(super) fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    }
}

pub(super) fn write_peer_file(dir: &TempDir, contents: &str) -> io::Result<PathBuf> {
    let path = dir.path().join("peers.conf");
    fs::write(&path, contents)?;
    Ok(path)
}

pub(super) fn run_cli_expecting_error(cli: Cli, panic_msg: &str) -> CliError {
    match run_cli(cli) {
        Ok(summary) => panic!("{panic_msg}: {summary:?}"),
        Err(err) => err,
    }
}

pub(super) fn parse(args: &[&str]) -> Cli {
    match <Cli as clap::Parser>::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => panic!("arguments must parse: {err}"),
    }
}
