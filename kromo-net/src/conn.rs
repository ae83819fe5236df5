//! A framed TCP connection to one node with its own read loop.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use futures::{SinkExt, StreamExt};
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace, warn};

use crate::{
    dispatch::DispatchTable,
    error::NetError,
    registry::Peer,
    wire::{FrameCodec, Message},
};

/// Reader half of a framed connection, before its read loop starts.
pub type FrameReader = FramedRead<OwnedReadHalf, FrameCodec>;

type FrameWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;

/// Sender notified with the node index when a connection's read loop ends.
pub type CloseNotifier = mpsc::UnboundedSender<u8>;

/// A connection to a node identified by its index; 0 is the coordinator.
///
/// Incoming frames are dispatched through the connection's
/// [`DispatchTable`] on a dedicated task. Dropping the connection stops
/// that task and closes the socket.
#[derive(Debug)]
pub struct NodeConn {
    index: Arc<AtomicU8>,
    remote: SocketAddr,
    writer: Mutex<FrameWriter>,
    reader: JoinHandle<()>,
}

impl NodeConn {
    /// Splits `stream` and starts its read loop.
    ///
    /// # Errors
    /// Returns [`NetError::Accept`] when the peer address is unavailable.
    pub fn spawn(
        stream: TcpStream,
        index: u8,
        table: DispatchTable,
        on_close: Option<CloseNotifier>,
    ) -> Result<Self, NetError> {
        let remote = stream
            .peer_addr()
            .map_err(|source| NetError::Accept { source })?;
        let (read, write) = stream.into_split();
        Ok(Self::from_parts(
            FramedRead::new(read, FrameCodec),
            write,
            remote,
            index,
            table,
            on_close,
        ))
    }

    /// Starts a read loop on a reader that has already consumed some frames.
    #[must_use]
    pub fn from_parts(
        frames: FrameReader,
        write: OwnedWriteHalf,
        remote: SocketAddr,
        index: u8,
        table: DispatchTable,
        on_close: Option<CloseNotifier>,
    ) -> Self {
        let shared_index = Arc::new(AtomicU8::new(index));
        let reader = tokio::spawn(read_loop(frames, table, Arc::clone(&shared_index), on_close));
        Self {
            index: shared_index,
            remote,
            writer: Mutex::new(FramedWrite::new(write, FrameCodec)),
            reader,
        }
    }

    /// Returns the remote socket address.
    #[must_use]
    #[rustfmt::skip]
    pub const fn remote(&self) -> SocketAddr { self.remote }

    /// Writes and flushes one message.
    ///
    /// # Errors
    /// Returns [`NetError::Send`] when the frame cannot be written.
    pub async fn send(&self, message: &Message) -> Result<(), NetError> {
        trace!(node = self.index(), opcode = %message.opcode(), "sending");
        self.writer
            .lock()
            .await
            .send(message)
            .await
            .map_err(|source| NetError::Send {
                node: self.index(),
                source,
            })
    }
}

impl Peer for NodeConn {
    fn index(&self) -> u8 {
        self.index.load(Ordering::Acquire)
    }

    fn assign_index(&mut self, index: u8) {
        self.index.store(index, Ordering::Release);
    }
}

impl Drop for NodeConn {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    mut frames: FrameReader,
    table: DispatchTable,
    index: Arc<AtomicU8>,
    on_close: Option<CloseNotifier>,
) {
    while let Some(next) = frames.next().await {
        let node = index.load(Ordering::Acquire);
        match next {
            Ok(frame) => {
                if let Err(error) = table.dispatch(&frame) {
                    warn!(
                        node,
                        code = error.code().as_str(),
                        %error,
                        "dropping message",
                    );
                }
            }
            Err(error) => {
                warn!(node, %error, "frame stream failed; closing connection");
                break;
            }
        }
    }
    let node = index.load(Ordering::Acquire);
    debug!(node, "connection closed");
    if let Some(notify) = on_close
        && notify.send(node).is_err()
    {
        trace!(node, "close listener already gone");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{io::AsyncWriteExt, net::TcpListener, time::timeout};

    use super::*;
    use crate::wire::Opcode;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (
            client.expect("connect loopback"),
            accepted.expect("accept loopback").0,
        )
    }

    #[tokio::test]
    async fn messages_reach_the_remote_dispatch_table() {
        let (left, right) = pair().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let table = DispatchTable::new().on_message(Opcode::RoundStart, move |message| {
            tx.send(message).map_err(|_| crate::error::ProtocolError::Rejected {
                opcode: Opcode::RoundStart,
                reason: "receiver dropped".to_owned(),
            })
        });
        let _receiver = NodeConn::spawn(right, 1, table, None).expect("spawn receiver");
        let sender = NodeConn::spawn(left, 0, DispatchTable::new(), None).expect("spawn sender");

        sender
            .send(&Message::RoundStart { round: 4 })
            .await
            .expect("send succeeds");
        let received = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("message arrives");
        assert_eq!(received, Some(Message::RoundStart { round: 4 }));
    }

    #[tokio::test]
    async fn bad_frames_are_dropped_and_the_loop_continues() {
        let (mut left, right) = pair().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let table = DispatchTable::new().on_message(Opcode::PeerHello, move |message| {
            tx.send(message).map_err(|_| crate::error::ProtocolError::Rejected {
                opcode: Opcode::PeerHello,
                reason: "receiver dropped".to_owned(),
            })
        });
        let _receiver = NodeConn::spawn(right, 1, table, None).expect("spawn receiver");

        // Unknown opcode, unhandled opcode, malformed hello, then a good hello.
        let bytes = [
            0x33, 0, 0, 0, 0, //
            7, 0, 0, 0, 4, 0, 0, 0, 1, //
            9, 0, 0, 0, 0, //
            9, 0, 0, 0, 1, 6,
        ];
        left.write_all(&bytes).await.expect("write raw frames");

        let received = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("message arrives");
        assert_eq!(received, Some(Message::PeerHello { node: 6 }));
    }

    #[tokio::test]
    async fn closing_notifies_with_the_assigned_index() {
        let (left, right) = pair().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watched = NodeConn::spawn(right, 0, DispatchTable::new(), Some(tx)).expect("spawn");
        watched.assign_index(3);
        drop(left);

        let closed = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("close is reported");
        assert_eq!(closed, Some(3));
        assert_eq!(watched.index(), 3);
    }
}
