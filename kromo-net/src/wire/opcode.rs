use std::fmt;

use crate::error::ProtocolError;

/// The closed set of message kinds carried on a kromo connection.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum Opcode {
    /// Vertex colour assignments.
    VertexInfo = 1,
    /// A node has finished all colouring work.
    NodeFinished = 2,
    /// A node has finished one round.
    NodeRoundFinished = 3,
    /// A node's assigned index and the total node count.
    NodeIndexCount = 4,
    /// Another node's listen address.
    NodeIp = 5,
    /// A node's share of the global graph.
    Subgraph = 6,
    /// Start of a colouring round.
    RoundStart = 7,
    /// Rounds are over; report final colours.
    ColoringComplete = 8,
    /// First message on a peer-to-peer link.
    PeerHello = 9,
}

impl Opcode {
    /// Every opcode in wire order.
    pub const ALL: [Self; 9] = [
        Self::VertexInfo,
        Self::NodeFinished,
        Self::NodeRoundFinished,
        Self::NodeIndexCount,
        Self::NodeIp,
        Self::Subgraph,
        Self::RoundStart,
        Self::ColoringComplete,
        Self::PeerHello,
    ];

    /// Returns the wire byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the symbolic protocol name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::VertexInfo => "VERTEX_INFO",
            Self::NodeFinished => "NODE_FINISHED",
            Self::NodeRoundFinished => "NODE_ROUND_FINISHED",
            Self::NodeIndexCount => "NODE_INDEX_COUNT",
            Self::NodeIp => "NODE_IP",
            Self::Subgraph => "SUBGRAPH",
            Self::RoundStart => "ROUND_START",
            Self::ColoringComplete => "COLORING_COMPLETE",
            Self::PeerHello => "PEER_HELLO",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|opcode| opcode.as_u8() == byte)
            .ok_or(ProtocolError::UnknownOpcode { opcode: byte })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
