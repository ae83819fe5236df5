//! Length-prefixed framing: `opcode: u8 | length: u32 | payload`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::Message;
use crate::error::FrameError;

/// Opcode byte plus big-endian payload length.
pub const HEADER_LEN: usize = 5;

/// Largest payload accepted in either direction.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// A raw frame whose opcode has not yet been interpreted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    /// Raw opcode byte.
    pub opcode: u8,
    /// Payload bytes.
    pub payload: Bytes,
}

/// Splits a byte stream into [`Frame`]s and writes [`Message`]s.
///
/// # Examples
/// ```
/// use bytes::BytesMut;
/// use kromo_net::wire::{FrameCodec, Message};
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = FrameCodec;
/// let mut buf = BytesMut::new();
/// codec.encode(&Message::RoundStart { round: 3 }, &mut buf).expect("frame fits");
/// assert_eq!(&buf[..], &[7, 0, 0, 0, 4, 0, 0, 0, 3]);
/// let frame = codec.decode(&mut buf).expect("stream is valid").expect("frame is complete");
/// assert_eq!(frame.opcode, 7);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let Some(mut header) = src.get(..HEADER_LEN) else {
            return Ok(None);
        };
        let opcode = header.get_u8();
        let len = usize::try_from(header.get_u32()).unwrap_or(usize::MAX);
        if len > MAX_PAYLOAD_LEN {
            return Err(FrameError::Oversized {
                len,
                max: MAX_PAYLOAD_LEN,
            });
        }
        let needed = HEADER_LEN + len;
        if src.len() < needed {
            src.reserve(needed - src.len());
            return Ok(None);
        }
        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        Ok(Some(Frame { opcode, payload }))
    }
}

impl Encoder<&Message> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, message: &Message, dst: &mut BytesMut) -> Result<(), FrameError> {
        let mut payload = BytesMut::new();
        message
            .encode_payload(&mut payload)
            .ok_or(FrameError::Oversized {
                len: usize::MAX,
                max: MAX_PAYLOAD_LEN,
            })?;
        let frame = Frame {
            opcode: message.opcode().as_u8(),
            payload: payload.freeze(),
        };
        Encoder::<Frame>::encode(self, frame, dst)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let len = frame.payload.len();
        let wire_len = u32::try_from(len)
            .ok()
            .filter(|_| len <= MAX_PAYLOAD_LEN)
            .ok_or(FrameError::Oversized {
                len,
                max: MAX_PAYLOAD_LEN,
            })?;
        dst.reserve(HEADER_LEN + len);
        dst.put_u8(frame.opcode);
        dst.put_u32(wire_len);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}
