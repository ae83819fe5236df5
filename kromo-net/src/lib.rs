//! Kromo networking: the framed wire protocol, connection registry and the
//! coordinator and peer halves of distributed colouring.

mod conn;
mod coordinator;
mod dispatch;
mod error;
mod gate;
mod peer;
mod registry;
mod reporter;
pub mod wire;

pub use crate::{
    conn::{CloseNotifier, FrameReader, NodeConn},
    coordinator::{Coordinator, CoordinatorConfig, DEFAULT_MAX_ROUNDS, DistributedOutcome},
    dispatch::{DispatchTable, Handler},
    error::{FrameError, NetError, NetErrorCode, ProtocolError, ProtocolErrorCode},
    gate::CompletionGate,
    peer::{PeerConfig, PeerNode, PeerOutcome},
    registry::{ConnectionRegistry, Peer},
    reporter::{Phase, RecordingReporter, Report, Reporter, TracingReporter},
};
