//! Error types for the kromo network layer.

use std::{io, net::SocketAddr};

use kromo_core::{ColoringError, GraphError};
use thiserror::Error;

use crate::wire::Opcode;

/// Failures tied to a single received message. The read loop logs these and
/// drops the message; the connection stays up.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The opcode byte names no known message.
    #[error("unknown opcode {opcode:#04x}")]
    UnknownOpcode {
        /// Raw opcode byte.
        opcode: u8,
    },
    /// The payload does not match its opcode's layout.
    #[error("malformed {opcode} payload: {reason}")]
    MalformedPayload {
        /// Opcode whose layout was violated.
        opcode: Opcode,
        /// Which part of the layout failed.
        reason: &'static str,
    },
    /// The connection's dispatch table has no handler for this opcode.
    #[error("no handler registered for {opcode}")]
    Unhandled {
        /// Opcode without a handler.
        opcode: Opcode,
    },
    /// A handler refused a well-formed message.
    #[error("{opcode} handler rejected message: {reason}")]
    Rejected {
        /// Opcode of the rejected message.
        opcode: Opcode,
        /// Why the handler refused it.
        reason: String,
    },
}

impl ProtocolError {
    /// Returns a stable, machine-readable error code for the variant.
    #[must_use]
    pub const fn code(&self) -> ProtocolErrorCode {
        match self {
            Self::UnknownOpcode { .. } => ProtocolErrorCode::UnknownOpcode,
            Self::MalformedPayload { .. } => ProtocolErrorCode::MalformedPayload,
            Self::Unhandled { .. } => ProtocolErrorCode::Unhandled,
            Self::Rejected { .. } => ProtocolErrorCode::Rejected,
        }
    }
}

/// Machine-readable error codes for [`ProtocolError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProtocolErrorCode {
    /// The opcode byte names no known message.
    UnknownOpcode,
    /// The payload does not match its opcode's layout.
    MalformedPayload,
    /// No handler is registered for the opcode.
    Unhandled,
    /// A handler refused a well-formed message.
    Rejected,
}

impl ProtocolErrorCode {
    /// Returns the symbolic identifier for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownOpcode => "PROTOCOL_UNKNOWN_OPCODE",
            Self::MalformedPayload => "PROTOCOL_MALFORMED_PAYLOAD",
            Self::Unhandled => "PROTOCOL_UNHANDLED",
            Self::Rejected => "PROTOCOL_REJECTED",
        }
    }
}

/// Stream-level framing failures. These end the connection's read loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameError {
    /// The socket failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A frame declared or produced a payload above the limit.
    #[error("frame payload of {len} bytes exceeds the {max} byte limit")]
    Oversized {
        /// Payload length in bytes.
        len: usize,
        /// Largest accepted payload length.
        max: usize,
    },
}

/// Errors raised while coordinating or serving a distributed colouring run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NetError {
    /// The peer list was empty.
    #[error("no peers configured")]
    NoPeers,
    /// More peers than a one-byte index can address.
    #[error("at most 255 peers are supported (got {got})")]
    TooManyPeers {
        /// Number of peers supplied.
        got: usize,
    },
    /// The graph has more vertices than the wire format can address.
    #[error("graph of {nodes} vertices exceeds the wire format's u32 range")]
    GraphTooLarge {
        /// Vertex count of the rejected graph.
        nodes: usize,
    },
    /// Binding a listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested listen address.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Accepting an inbound connection failed.
    #[error("failed to accept connection: {source}")]
    Accept {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Dialling a peer failed or timed out.
    #[error("failed to connect to {addr}: {source}")]
    Dial {
        /// Address that was dialled.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Writing a message to a peer failed.
    #[error("failed to send to node {node}: {source}")]
    Send {
        /// Index of the receiving node.
        node: u8,
        /// Underlying framing error.
        #[source]
        source: FrameError,
    },
    /// A message arrived out of protocol order.
    #[error("expected {expected}, received {received}")]
    UnexpectedMessage {
        /// Description of the awaited message.
        expected: &'static str,
        /// What arrived instead.
        received: String,
    },
    /// A setup step took longer than allowed.
    #[error("timed out waiting for {stage}")]
    SetupTimeout {
        /// Step that timed out.
        stage: &'static str,
    },
    /// A message was well-formed but unusable in this run.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// A connection closed before its node finished.
    #[error("node {node} disconnected before finishing")]
    PeerDisconnected {
        /// Index of the disconnected node; 0 is the coordinator.
        node: u8,
    },
    /// Not every node reported in time for a round.
    #[error("round {round} did not complete within the round timeout")]
    RoundTimeout {
        /// Round that stalled.
        round: u32,
    },
    /// Conflicts persisted past the configured round limit.
    #[error("colouring did not converge within {max_rounds} rounds")]
    RoundLimitExceeded {
        /// Configured round limit.
        max_rounds: u32,
    },
    /// Not every node sent `NODE_FINISHED` before the deadline.
    #[error("{remaining} node(s) did not finish before the completion timeout")]
    CompletionTimeout {
        /// Nodes still outstanding.
        remaining: usize,
    },
    /// The completion wait was cancelled.
    #[error("coordination aborted: {reason}")]
    CoordinationAborted {
        /// Why the run was aborted.
        reason: String,
    },
    /// Local colouring failed.
    #[error(transparent)]
    Coloring(#[from] ColoringError),
    /// Local graph construction failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {message}")]
    Task {
        /// Join error description.
        message: String,
    },
    /// A synchronisation primitive became poisoned after a panic.
    #[error("lock for {resource} is poisoned")]
    LockPoisoned {
        /// Name of the poisoned resource.
        resource: &'static str,
    },
}

impl NetError {
    /// Returns a stable, machine-readable error code for the variant.
    #[must_use]
    pub const fn code(&self) -> NetErrorCode {
        match self {
            Self::NoPeers => NetErrorCode::NoPeers,
            Self::TooManyPeers { .. } => NetErrorCode::TooManyPeers,
            Self::GraphTooLarge { .. } => NetErrorCode::GraphTooLarge,
            Self::Bind { .. } => NetErrorCode::Bind,
            Self::Accept { .. } => NetErrorCode::Accept,
            Self::Dial { .. } => NetErrorCode::Dial,
            Self::Send { .. } => NetErrorCode::Send,
            Self::UnexpectedMessage { .. } => NetErrorCode::UnexpectedMessage,
            Self::SetupTimeout { .. } => NetErrorCode::SetupTimeout,
            Self::Protocol(_) => NetErrorCode::Protocol,
            Self::PeerDisconnected { .. } => NetErrorCode::PeerDisconnected,
            Self::RoundTimeout { .. } => NetErrorCode::RoundTimeout,
            Self::RoundLimitExceeded { .. } => NetErrorCode::RoundLimitExceeded,
            Self::CompletionTimeout { .. } => NetErrorCode::CompletionTimeout,
            Self::CoordinationAborted { .. } => NetErrorCode::CoordinationAborted,
            Self::Coloring(_) => NetErrorCode::Coloring,
            Self::Graph(_) => NetErrorCode::Graph,
            Self::Task { .. } => NetErrorCode::Task,
            Self::LockPoisoned { .. } => NetErrorCode::LockPoisoned,
        }
    }
}

/// Machine-readable error codes for [`NetError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NetErrorCode {
    /// The peer list was empty.
    NoPeers,
    /// More peers than a one-byte index can address.
    TooManyPeers,
    /// The graph exceeds the wire format's range.
    GraphTooLarge,
    /// Binding a listener failed.
    Bind,
    /// Accepting a connection failed.
    Accept,
    /// Dialling a peer failed.
    Dial,
    /// Writing to a peer failed.
    Send,
    /// A message arrived out of order.
    UnexpectedMessage,
    /// A setup step timed out.
    SetupTimeout,
    /// A message was unusable.
    Protocol,
    /// A connection closed early.
    PeerDisconnected,
    /// A round stalled.
    RoundTimeout,
    /// Rounds did not converge.
    RoundLimitExceeded,
    /// Completion timed out.
    CompletionTimeout,
    /// Completion was aborted.
    CoordinationAborted,
    /// Local colouring failed.
    Coloring,
    /// Local graph construction failed.
    Graph,
    /// A background task failed.
    Task,
    /// A lock was poisoned.
    LockPoisoned,
}

impl NetErrorCode {
    /// Returns the symbolic identifier for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoPeers => "NET_NO_PEERS",
            Self::TooManyPeers => "NET_TOO_MANY_PEERS",
            Self::GraphTooLarge => "NET_GRAPH_TOO_LARGE",
            Self::Bind => "NET_BIND",
            Self::Accept => "NET_ACCEPT",
            Self::Dial => "NET_DIAL",
            Self::Send => "NET_SEND",
            Self::UnexpectedMessage => "NET_UNEXPECTED_MESSAGE",
            Self::SetupTimeout => "NET_SETUP_TIMEOUT",
            Self::Protocol => "NET_PROTOCOL",
            Self::PeerDisconnected => "NET_PEER_DISCONNECTED",
            Self::RoundTimeout => "NET_ROUND_TIMEOUT",
            Self::RoundLimitExceeded => "NET_ROUND_LIMIT_EXCEEDED",
            Self::CompletionTimeout => "NET_COMPLETION_TIMEOUT",
            Self::CoordinationAborted => "NET_COORDINATION_ABORTED",
            Self::Coloring => "NET_COLORING",
            Self::Graph => "NET_GRAPH",
            Self::Task => "NET_TASK",
            Self::LockPoisoned => "NET_LOCK_POISONED",
        }
    }
}
