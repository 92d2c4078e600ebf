//! # Frame Layer
//!
//! AMQP 1.0 frames: an 8-byte header (`size`, `doff`, `type`, `channel`)
//! followed by an optional performative and payload. An empty body is a
//! heartbeat. [`FrameDecoder`] accumulates partial reads and yields frames as
//! they complete.

use crate::constants::{FRAME_HEADER_SIZE, MIN_MAX_FRAME_SIZE};
use crate::error::{CodecError, CodecResult};
use crate::parser::ValueParser;
use crate::performative::Performative;
use crate::sasl::SaslFrame;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Frame type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Amqp = 0x00,
    Sasl = 0x01,
}

impl TryFrom<u8> for FrameType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(FrameType::Amqp),
            0x01 => Ok(FrameType::Sasl),
            other => Err(CodecError::invalid_frame(
                format!("unknown frame type {other:#04x}"),
                0,
            )),
        }
    }
}

/// Body of a decoded frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    /// Empty frame, used as a keep-alive
    Heartbeat,
    Amqp {
        performative: Performative,
        payload: Bytes,
    },
    Sasl(SaslFrame),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub channel: u16,
    pub body: FrameBody,
}

impl Frame {
    pub fn amqp(channel: u16, performative: Performative) -> Self {
        Self {
            channel,
            body: FrameBody::Amqp {
                performative,
                payload: Bytes::new(),
            },
        }
    }

    /// A performative followed by message bytes (transfer frames)
    pub fn amqp_with_payload(channel: u16, performative: Performative, payload: Bytes) -> Self {
        Self {
            channel,
            body: FrameBody::Amqp {
                performative,
                payload,
            },
        }
    }

    pub fn sasl(body: SaslFrame) -> Self {
        Self {
            channel: 0,
            body: FrameBody::Sasl(body),
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Heartbeat,
        }
    }

    pub fn frame_type(&self) -> FrameType {
        match self.body {
            FrameBody::Sasl(_) => FrameType::Sasl,
            _ => FrameType::Amqp,
        }
    }

    /// Append the encoded frame to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut body = BytesMut::new();
        match &self.body {
            FrameBody::Heartbeat => {}
            FrameBody::Amqp {
                performative,
                payload,
            } => {
                performative.to_value().encode(&mut body);
                body.put_slice(payload);
            }
            FrameBody::Sasl(sasl) => sasl.to_value().encode(&mut body),
        }

        buf.reserve(FRAME_HEADER_SIZE + body.len());
        buf.put_u32((FRAME_HEADER_SIZE + body.len()) as u32);
        buf.put_u8(2);
        buf.put_u8(self.frame_type() as u8);
        buf.put_u16(self.channel);
        buf.put_slice(&body);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode one complete frame (header included)
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(CodecError::truncated(FRAME_HEADER_SIZE, data.len(), "frame header"));
        }
        let size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if size != data.len() {
            return Err(CodecError::invalid_frame("size does not match buffer", size));
        }
        let doff = data[4] as usize * 4;
        if doff < FRAME_HEADER_SIZE || doff > size {
            return Err(CodecError::invalid_frame(format!("bad data offset {doff}"), size));
        }
        let frame_type = FrameType::try_from(data[5])?;
        let channel = u16::from_be_bytes([data[6], data[7]]);
        let body = &data[doff..];

        if body.is_empty() {
            return Ok(Self {
                channel,
                body: FrameBody::Heartbeat,
            });
        }

        let mut parser = ValueParser::new(body);
        let value = parser.parse_value()?;
        let body = match frame_type {
            FrameType::Amqp => FrameBody::Amqp {
                performative: Performative::from_value(value)?,
                payload: Bytes::copy_from_slice(&body[parser.position()..]),
            },
            FrameType::Sasl => FrameBody::Sasl(SaslFrame::from_value(value)?),
        };
        Ok(Self { channel, body })
    }
}

/// Incremental frame splitter over a growing read buffer
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            max_frame_size: u32::MAX as usize,
        }
    }
}

impl FrameDecoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.max(MIN_MAX_FRAME_SIZE as usize),
        }
    }

    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size.max(MIN_MAX_FRAME_SIZE as usize);
    }

    /// Remove and decode the next complete frame from `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed; the buffer is left untouched.
    pub fn decode(&self, buf: &mut BytesMut) -> CodecResult<Option<Frame>> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if size < FRAME_HEADER_SIZE {
            return Err(CodecError::invalid_frame("size smaller than header", size));
        }
        if size > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size,
                limit: self.max_frame_size,
            });
        }
        if buf.len() < size {
            buf.reserve(size - buf.len());
            return Ok(None);
        }
        let raw = buf.split_to(size);
        tracing::trace!(size, "Frame complete");
        Frame::decode(&raw).map(Some)
    }
}

/// Strip an 8-byte protocol header from the front of `buf` if complete
pub fn take_protocol_header(buf: &mut BytesMut) -> Option<[u8; 8]> {
    if buf.len() < 8 {
        return None;
    }
    let mut header = [0u8; 8];
    buf.copy_to_slice(&mut header);
    Some(header)
}
