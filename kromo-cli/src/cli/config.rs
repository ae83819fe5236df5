//! Peer list files: one `IPv4:port` address per line, in registration order.

use std::{fs, io, net::SocketAddrV4, path::Path};

use tracing::{Span, debug, field, instrument};

use super::CliError;

/// Reads and parses the peer list at `path`.
#[instrument(name = "cli.read_peer_file", err, fields(path = field::Empty))]
pub(super) fn read_peer_file(path: &Path) -> Result<Vec<SocketAddrV4>, CliError> {
    Span::current().record("path", field::display(path.display()));
    let contents = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => CliError::MissingConfig {
            path: path.to_path_buf(),
        },
        _ => CliError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    parse_peer_list(&contents)
}

/// Parses peer addresses, skipping blank lines and `#` comments.
pub(super) fn parse_peer_list(contents: &str) -> Result<Vec<SocketAddrV4>, CliError> {
    let mut peers = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let addr = line
            .parse::<SocketAddrV4>()
            .map_err(|source| CliError::InvalidPeerAddress {
                line: index + 1,
                value: line.to_owned(),
                source,
            })?;
        peers.push(addr);
    }
    if peers.is_empty() {
        return Err(CliError::EmptyPeerList);
    }
    debug!(peers = peers.len(), "peer list parsed");
    Ok(peers)
}
