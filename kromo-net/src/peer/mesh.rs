//! Peer-to-peer links: each node dials every higher node and accepts one
//! connection from every lower node.

use std::{
    collections::BTreeMap,
    net::{SocketAddr, SocketAddrV4},
};

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::{
    conn::{CloseNotifier, NodeConn},
    dispatch::DispatchTable,
    error::NetError,
    wire::{FrameCodec, Message, Opcode},
};

const HELLO: &str = "PEER_HELLO";

/// Opens every link for `node` and returns them keyed by remote index.
pub(super) async fn connect(
    listener: &TcpListener,
    node: u8,
    higher: &BTreeMap<u8, SocketAddrV4>,
    table: &DispatchTable,
    closed: &CloseNotifier,
) -> Result<BTreeMap<u8, NodeConn>, NetError> {
    let (mut dialled, accepted) = tokio::try_join!(
        dial_higher(node, higher, table, closed),
        accept_lower(listener, node, table, closed),
    )?;
    dialled.extend(accepted);
    Ok(dialled)
}

async fn dial_higher(
    node: u8,
    higher: &BTreeMap<u8, SocketAddrV4>,
    table: &DispatchTable,
    closed: &CloseNotifier,
) -> Result<BTreeMap<u8, NodeConn>, NetError> {
    let mut links = BTreeMap::new();
    for (&peer, &addr) in higher {
        let target = SocketAddr::V4(addr);
        let stream = TcpStream::connect(target)
            .await
            .map_err(|source| NetError::Dial { addr: target, source })?;
        stream
            .set_nodelay(true)
            .map_err(|source| NetError::Dial { addr: target, source })?;
        let link = NodeConn::spawn(stream, peer, table.clone(), Some(closed.clone()))?;
        link.send(&Message::PeerHello { node }).await?;
        debug!(peer, %addr, "dialled higher peer");
        links.insert(peer, link);
    }
    Ok(links)
}

async fn accept_lower(
    listener: &TcpListener,
    node: u8,
    table: &DispatchTable,
    closed: &CloseNotifier,
) -> Result<BTreeMap<u8, NodeConn>, NetError> {
    let expected = usize::from(node.saturating_sub(1));
    let mut links = BTreeMap::new();
    while links.len() < expected {
        let (stream, remote) = listener
            .accept()
            .await
            .map_err(|source| NetError::Accept { source })?;
        stream
            .set_nodelay(true)
            .map_err(|source| NetError::Accept { source })?;
        let (read, write) = stream.into_split();
        let mut frames = FramedRead::new(read, FrameCodec);
        let hello = match frames.next().await {
            Some(Ok(frame)) => Message::decode(Opcode::try_from(frame.opcode)?, &frame.payload)?,
            Some(Err(error)) => {
                return Err(NetError::UnexpectedMessage {
                    expected: HELLO,
                    received: error.to_string(),
                });
            }
            None => {
                return Err(NetError::UnexpectedMessage {
                    expected: HELLO,
                    received: "end of stream".to_owned(),
                });
            }
        };
        let lower = match hello {
            Message::PeerHello { node: lower }
                if (1..node).contains(&lower) && !links.contains_key(&lower) =>
            {
                lower
            }
            Message::PeerHello { node: other } => {
                return Err(NetError::UnexpectedMessage {
                    expected: HELLO,
                    received: format!("{HELLO} from node {other}"),
                });
            }
            other => {
                return Err(NetError::UnexpectedMessage {
                    expected: HELLO,
                    received: other.opcode().to_string(),
                });
            }
        };
        debug!(peer = lower, %remote, "accepted lower peer");
        links.insert(
            lower,
            NodeConn::from_parts(frames, write, remote, lower, table.clone(), Some(closed.clone())),
        );
    }
    Ok(links)
}
