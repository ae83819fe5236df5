//! Typed messages and their payload layouts.
//!
//! All integers are big-endian. Decoding checks every length against the
//! opcode's layout and rejects trailing bytes.

use std::{mem, net::SocketAddrV4, ops::Range};

use bytes::{Buf, BufMut};
use kromo_core::Color;

use super::Opcode;
use crate::error::ProtocolError;

/// A vertex and the colour its owner committed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VertexColor {
    /// Global vertex index.
    pub vertex: u32,
    /// Committed colour.
    pub color: Color,
}

/// One node's share of the global graph: the partition table and the full
/// adjacency of every vertex it owns.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Subgraph {
    total_vertices: u32,
    max_color: Color,
    offsets: Vec<u32>,
    adjacency: Vec<Vec<u32>>,
}

impl Subgraph {
    /// Validates a partition table and the owned adjacency lists.
    ///
    /// `offsets` has one more entry than there are nodes; node `i` (from 1)
    /// owns `offsets[i - 1]..offsets[i]`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedPayload`] when the table is empty,
    /// does not start at zero, decreases, does not end at `total_vertices`,
    /// names more than 255 nodes, or a neighbour is out of range.
    pub fn new(
        total_vertices: u32,
        max_color: Color,
        offsets: Vec<u32>,
        adjacency: Vec<Vec<u32>>,
    ) -> Result<Self, ProtocolError> {
        let malformed = |reason| ProtocolError::MalformedPayload {
            opcode: Opcode::Subgraph,
            reason,
        };
        if offsets.len() < 2 || offsets.len() > usize::from(u8::MAX) + 1 {
            return Err(malformed("partition table must name 1 to 255 nodes"));
        }
        if offsets.first() != Some(&0) || offsets.last() != Some(&total_vertices) {
            return Err(malformed("partition table must span every vertex"));
        }
        if offsets.iter().zip(offsets.iter().skip(1)).any(|(start, end)| start > end) {
            return Err(malformed("partition table must not decrease"));
        }
        if adjacency.iter().flatten().any(|&neighbour| neighbour >= total_vertices) {
            return Err(malformed("neighbour is out of range"));
        }
        Ok(Self {
            total_vertices,
            max_color,
            offsets,
            adjacency,
        })
    }

    /// Returns the vertex count of the global graph.
    #[must_use]
    #[rustfmt::skip]
    pub const fn total_vertices(&self) -> u32 { self.total_vertices }

    /// Returns the palette size for the run.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max_color(&self) -> Color { self.max_color }

    /// Returns the partition table.
    #[must_use]
    #[rustfmt::skip]
    pub fn offsets(&self) -> &[u32] { &self.offsets }

    /// Returns the owned vertices' neighbour lists in vertex order.
    #[must_use]
    #[rustfmt::skip]
    pub fn adjacency(&self) -> &[Vec<u32>] { &self.adjacency }

    /// Returns the number of nodes in the partition table.
    #[must_use]
    pub fn node_count(&self) -> u8 {
        u8::try_from(self.offsets.len() - 1).unwrap_or(u8::MAX)
    }

    /// Returns the vertices owned by `node` (indexed from 1).
    #[must_use]
    pub fn owned_range(&self, node: u8) -> Option<Range<u32>> {
        let position = usize::from(node);
        let start = *self.offsets.get(position.checked_sub(1)?)?;
        let end = *self.offsets.get(position)?;
        Some(start..end)
    }

    /// Splits the owned rows into consecutive parts that share this header,
    /// each carrying at most `row_bytes` of encoded rows.
    ///
    /// A part always holds at least one row, so a single row larger than
    /// `row_bytes` travels alone. A share without rows yields one empty part.
    #[must_use]
    pub fn split_rows(self, row_bytes: usize) -> Vec<Self> {
        let Self {
            total_vertices,
            max_color,
            offsets,
            adjacency,
        } = self;
        let mut parts = Vec::new();
        let mut rows = Vec::new();
        let mut used = 0_usize;
        for row in adjacency {
            let cost = encoded_row_len(&row);
            if !rows.is_empty() && used.saturating_add(cost) > row_bytes {
                parts.push(Self {
                    total_vertices,
                    max_color,
                    offsets: offsets.clone(),
                    adjacency: mem::take(&mut rows),
                });
                used = 0;
            }
            used = used.saturating_add(cost);
            rows.push(row);
        }
        parts.push(Self {
            total_vertices,
            max_color,
            offsets,
            adjacency: rows,
        });
        parts
    }

    /// Appends the rows of a later part of the same share.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedPayload`] when `part` describes a
    /// different graph, palette or partition table.
    pub fn append_rows(&mut self, part: Self) -> Result<(), ProtocolError> {
        if part.total_vertices != self.total_vertices
            || part.max_color != self.max_color
            || part.offsets != self.offsets
        {
            return Err(ProtocolError::MalformedPayload {
                opcode: Opcode::Subgraph,
                reason: "subgraph part does not match the first part's header",
            });
        }
        self.adjacency.extend(part.adjacency);
        Ok(())
    }

    /// Returns the node owning `vertex`.
    ///
    /// # Examples
    /// ```
    /// use kromo_net::wire::Subgraph;
    ///
    /// let subgraph = Subgraph::new(5, 5, vec![0, 3, 5], vec![]).expect("table is valid");
    /// assert_eq!(subgraph.owner_of(2), Some(1));
    /// assert_eq!(subgraph.owner_of(3), Some(2));
    /// assert_eq!(subgraph.owner_of(5), None);
    /// ```
    #[must_use]
    pub fn owner_of(&self, vertex: u32) -> Option<u8> {
        if vertex >= self.total_vertices {
            return None;
        }
        u8::try_from(self.offsets.partition_point(|&offset| offset <= vertex)).ok()
    }
}

/// Degree word plus one word per neighbour.
fn encoded_row_len(row: &[u32]) -> usize {
    row.len().saturating_add(1).saturating_mul(4)
}

/// A decoded protocol message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    /// Colours committed for specific vertices.
    VertexInfo(Vec<VertexColor>),
    /// `node` has finished all colouring work.
    NodeFinished {
        /// Reporting node.
        node: u8,
    },
    /// `node` has finished `round`, resetting `conflicts` vertices.
    NodeRoundFinished {
        /// Reporting node.
        node: u8,
        /// Round number; 0 is the readiness report.
        round: u32,
        /// Vertices returned to pending this round.
        conflicts: u32,
    },
    /// The receiver's index and the total node count.
    NodeIndexCount {
        /// Receiver's index.
        node: u8,
        /// Number of registered nodes.
        total: u8,
    },
    /// The listen address of `node`.
    NodeIp {
        /// Node being described.
        node: u8,
        /// Its listen address.
        addr: SocketAddrV4,
    },
    /// The receiver's share of the graph.
    Subgraph(Subgraph),
    /// Begin colouring round `round`.
    RoundStart {
        /// Round number, from 1.
        round: u32,
    },
    /// Rounds are over.
    ColoringComplete,
    /// Identifies the dialling node on a peer link.
    PeerHello {
        /// Dialling node.
        node: u8,
    },
}

impl Message {
    /// Returns the opcode carried in the frame header.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::VertexInfo(_) => Opcode::VertexInfo,
            Self::NodeFinished { .. } => Opcode::NodeFinished,
            Self::NodeRoundFinished { .. } => Opcode::NodeRoundFinished,
            Self::NodeIndexCount { .. } => Opcode::NodeIndexCount,
            Self::NodeIp { .. } => Opcode::NodeIp,
            Self::Subgraph(_) => Opcode::Subgraph,
            Self::RoundStart { .. } => Opcode::RoundStart,
            Self::ColoringComplete => Opcode::ColoringComplete,
            Self::PeerHello { .. } => Opcode::PeerHello,
        }
    }

    /// Writes the payload for this message.
    ///
    /// Returns `None` when a list is too long to describe with a `u32`.
    pub(crate) fn encode_payload(&self, dst: &mut impl BufMut) -> Option<()> {
        match self {
            Self::VertexInfo(colors) => {
                for entry in colors {
                    dst.put_u32(entry.vertex);
                    dst.put_u32(entry.color);
                }
            }
            Self::NodeFinished { node } | Self::PeerHello { node } => dst.put_u8(*node),
            Self::NodeRoundFinished {
                node,
                round,
                conflicts,
            } => {
                dst.put_u8(*node);
                dst.put_u32(*round);
                dst.put_u32(*conflicts);
            }
            Self::NodeIndexCount { node, total } => {
                dst.put_u8(*node);
                dst.put_u8(*total);
            }
            Self::NodeIp { node, addr } => {
                dst.put_u8(*node);
                dst.put_slice(&addr.ip().octets());
                dst.put_u16(addr.port());
            }
            Self::Subgraph(subgraph) => {
                dst.put_u32(subgraph.total_vertices);
                dst.put_u32(subgraph.max_color);
                dst.put_u8(subgraph.node_count());
                for &offset in &subgraph.offsets {
                    dst.put_u32(offset);
                }
                for neighbours in &subgraph.adjacency {
                    dst.put_u32(u32::try_from(neighbours.len()).ok()?);
                    for &neighbour in neighbours {
                        dst.put_u32(neighbour);
                    }
                }
            }
            Self::RoundStart { round } => dst.put_u32(*round),
            Self::ColoringComplete => {}
        }
        Some(())
    }

    /// Decodes `payload` according to `opcode`'s layout.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedPayload`] when the payload is
    /// truncated, has trailing bytes or carries inconsistent values.
    ///
    /// # Examples
    /// ```
    /// use kromo_net::wire::{Message, Opcode};
    ///
    /// let message = Message::decode(Opcode::NodeIndexCount, &[2, 3]).expect("payload is valid");
    /// assert_eq!(message, Message::NodeIndexCount { node: 2, total: 3 });
    /// assert!(Message::decode(Opcode::NodeIndexCount, &[2]).is_err());
    /// ```
    pub fn decode(opcode: Opcode, payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PayloadReader {
            opcode,
            buf: payload,
        };
        let message = match opcode {
            Opcode::VertexInfo => {
                if !payload.len().is_multiple_of(8) {
                    return Err(reader.malformed("length is not a multiple of 8"));
                }
                let mut colors = Vec::with_capacity(payload.len() >> 3);
                while reader.buf.has_remaining() {
                    colors.push(VertexColor {
                        vertex: reader.u32()?,
                        color: reader.u32()?,
                    });
                }
                Self::VertexInfo(colors)
            }
            Opcode::NodeFinished => Self::NodeFinished { node: reader.u8()? },
            Opcode::NodeRoundFinished => Self::NodeRoundFinished {
                node: reader.u8()?,
                round: reader.u32()?,
                conflicts: reader.u32()?,
            },
            Opcode::NodeIndexCount => Self::NodeIndexCount {
                node: reader.u8()?,
                total: reader.u8()?,
            },
            Opcode::NodeIp => {
                let node = reader.u8()?;
                let octets = [reader.u8()?, reader.u8()?, reader.u8()?, reader.u8()?];
                let port = reader.u16()?;
                Self::NodeIp {
                    node,
                    addr: SocketAddrV4::new(octets.into(), port),
                }
            }
            Opcode::Subgraph => Self::Subgraph(reader.subgraph()?),
            Opcode::RoundStart => Self::RoundStart {
                round: reader.u32()?,
            },
            Opcode::ColoringComplete => Self::ColoringComplete,
            Opcode::PeerHello => Self::PeerHello { node: reader.u8()? },
        };
        if reader.buf.has_remaining() {
            return Err(reader.malformed("trailing bytes after payload"));
        }
        Ok(message)
    }
}

struct PayloadReader<'a> {
    opcode: Opcode,
    buf: &'a [u8],
}

impl PayloadReader<'_> {
    const fn malformed(&self, reason: &'static str) -> ProtocolError {
        ProtocolError::MalformedPayload {
            opcode: self.opcode,
            reason,
        }
    }

    fn ensure(&self, bytes: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < bytes {
            return Err(self.malformed("payload is truncated"));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    fn subgraph(&mut self) -> Result<Subgraph, ProtocolError> {
        let total_vertices = self.u32()?;
        let max_color = self.u32()?;
        let nodes = usize::from(self.u8()?);
        let offsets = (0..=nodes)
            .map(|_| self.u32())
            .collect::<Result<Vec<_>, _>>()?;
        let mut adjacency = Vec::new();
        while self.buf.has_remaining() {
            let degree = usize::try_from(self.u32()?)
                .map_err(|_| self.malformed("degree does not fit in memory"))?;
            // Refuse to allocate for a degree the remaining bytes cannot hold.
            self.ensure(degree.saturating_mul(4))?;
            let neighbours = (0..degree)
                .map(|_| self.u32())
                .collect::<Result<Vec<_>, _>>()?;
            adjacency.push(neighbours);
        }
        Subgraph::new(total_vertices, max_color, offsets, adjacency)
    }
}
