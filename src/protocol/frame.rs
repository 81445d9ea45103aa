//! Frame parsing and serialization (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                 Masking key (if MASK set)                     |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```
//!
//! Payload lengths use three tiers: 0-125 inline, 126 followed by a
//! big-endian `u16`, 127 followed by a big-endian `u64`.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest length that fits the inline 7-bit tier.
const MAX_INLINE_LEN: usize = 125;

/// Marker for the 16-bit extended length tier.
const LEN_16: u8 = 126;

/// Marker for the 64-bit extended length tier.
const LEN_64: u8 = 127;

/// Number of extended length bytes that follow a 7-bit base length.
#[inline]
#[must_use]
pub const fn extended_length_bytes(base: u8) -> usize {
    match base {
        LEN_16 => 2,
        LEN_64 => 8,
        _ => 0,
    }
}

/// The 7-bit base length and extended length size used to encode `len`.
#[inline]
#[must_use]
pub const fn length_encoding(len: usize) -> (u8, usize) {
    if len <= MAX_INLINE_LEN {
        (len as u8, 0)
    } else if len <= u16::MAX as usize {
        (LEN_16, 2)
    } else {
        (LEN_64, 8)
    }
}

/// Decode the payload length from the start of a frame.
///
/// Returns `Ok(None)` until enough bytes are buffered to know the length.
///
/// # Errors
///
/// Returns [`Error::ProtocolViolation`] if a 64-bit length has its most
/// significant bit set.
pub fn peek_payload_len(buf: &[u8]) -> Result<Option<u64>> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let base = buf[1] & 0x7F;
    let len = match base {
        0..=125 => u64::from(base),
        LEN_16 => match buf.get(2..4) {
            Some(b) => u64::from(u16::from_be_bytes([b[0], b[1]])),
            None => return Ok(None),
        },
        LEN_64 => match buf.get(2..10) {
            Some(b) => {
                let len = u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
                if len >> 63 != 0 {
                    return Err(Error::ProtocolViolation(
                        "64-bit payload length has its most significant bit set".into(),
                    ));
                }
                len
            }
            None => return Ok(None),
        },
        _ => unreachable!("7-bit length out of range"),
    };
    Ok(Some(len))
}

/// A decoded frame header.
///
/// The opcode is kept raw so that a frame with an unknown opcode can still
/// be skipped in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Raw 4-bit opcode.
    pub opcode: u8,
    /// Masking key, present iff the MASK bit is set.
    pub mask: Option<[u8; 4]>,
    /// Declared payload length.
    pub payload_len: u64,
    /// Bytes occupied by the header, including extended length and mask key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a header from the start of `buf`.
    ///
    /// Returns `Ok(None)` if `buf` does not yet hold the complete header.
    ///
    /// # Errors
    ///
    /// Propagates the length errors of [`peek_payload_len`].
    pub fn parse(buf: &[u8]) -> Result<Option<Self>> {
        let Some(payload_len) = peek_payload_len(buf)? else {
            return Ok(None);
        };

        let byte0 = buf[0];
        let byte1 = buf[1];
        let masked = (byte1 & 0x80) != 0;
        let mask_offset = 2 + extended_length_bytes(byte1 & 0x7F);
        let header_len = if masked { mask_offset + 4 } else { mask_offset };

        if buf.len() < header_len {
            return Ok(None);
        }

        let mask = masked.then(|| {
            [
                buf[mask_offset],
                buf[mask_offset + 1],
                buf[mask_offset + 2],
                buf[mask_offset + 3],
            ]
        });

        Ok(Some(Self {
            fin: (byte0 & 0x80) != 0,
            rsv1: (byte0 & 0x40) != 0,
            rsv2: (byte0 & 0x20) != 0,
            rsv3: (byte0 & 0x10) != 0,
            opcode: byte0 & 0x0F,
            mask,
            payload_len,
            header_len,
        }))
    }

    /// Total wire size of the frame this header describes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if the frame cannot be addressed on
    /// this platform.
    pub fn frame_len(&self) -> Result<usize> {
        usize::try_from(self.payload_len)
            .ok()
            .and_then(|len| len.checked_add(self.header_len))
            .ok_or(Error::FrameTooLarge {
                size: self.payload_len,
                max: usize::MAX as u64,
            })
    }
}

/// A single WebSocket frame with an unmasked payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Reserved bit 1. Must be 0.
    pub rsv1: bool,
    /// Reserved bit 2. Must be 0.
    pub rsv2: bool,
    /// Reserved bit 3. Must be 0.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a frame with all reserved bits clear.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload,
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = code.to_be_bytes().to_vec();
                data.extend_from_slice(reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Build a frame from a parsed header and its (still masked) payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOpcode`] if the header's opcode is not in the table.
    pub fn from_parts(header: &FrameHeader, mut payload: Vec<u8>) -> Result<Self> {
        let opcode = OpCode::from_u8(header.opcode)?;
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }
        Ok(Self {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode,
            payload,
        })
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse a complete frame from the start of `buf`.
    ///
    /// Returns the frame and the number of bytes consumed, or `Ok(None)` if
    /// `buf` holds only part of a frame.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownOpcode` if the opcode is not in the table
    /// - `Error::ProtocolViolation` for a malformed 64-bit length
    /// - `Error::FrameTooLarge` if the frame cannot be addressed on this platform
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        let Some(header) = FrameHeader::parse(buf)? else {
            return Ok(None);
        };
        let total = header.frame_len()?;
        if buf.len() < total {
            return Ok(None);
        }
        let frame = Self::from_parts(&header, buf[header.header_len..total].to_vec())?;
        Ok(Some((frame, total)))
    }

    /// Validate the frame according to RFC 6455.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if RSV bits are set
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control frame payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }

        Ok(())
    }

    /// Append the wire encoding of this frame to `dst`.
    ///
    /// With `Some(mask)` the MASK bit is set, the key written, and the
    /// payload XOR-ed with it on the way out; `self` is left untouched.
    pub fn encode(&self, dst: &mut BytesMut, mask: Option<[u8; 4]>) {
        let payload_len = self.payload.len();
        let (base, extended) = length_encoding(payload_len);
        dst.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        dst.put_u8(byte0);
        dst.put_u8(if mask.is_some() { base | 0x80 } else { base });

        match extended {
            2 => dst.put_u16(payload_len as u16),
            8 => dst.put_u64(payload_len as u64),
            _ => {}
        }

        match mask {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask_fast(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Calculate the number of bytes [`encode`](Self::encode) produces.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let (_, extended) = length_encoding(self.payload.len());
        let mask_size = if masked { 4 } else { 0 };
        2 + extended + mask_size + self.payload.len()
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::text(text.into_bytes()),
            Message::Binary(data) => Frame::binary(data),
            Message::Ping(data) => Frame::ping(data),
            Message::Pong(data) => Frame::pong(data),
            Message::Close(Some(close)) => Frame::new(true, OpCode::Close, close.to_payload()),
            Message::Close(None) => Frame::close(None, ""),
        }
    }
}
