//! The kromo wire protocol: opcodes, typed messages and frame codec.

mod codec;
mod message;
mod opcode;

pub use self::{
    codec::{Frame, FrameCodec, HEADER_LEN, MAX_PAYLOAD_LEN},
    message::{Message, Subgraph, VertexColor},
    opcode::Opcode,
};
