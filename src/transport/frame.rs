//! Native-mode message frame.
//!
//! The transport only inspects the header: the validity check and the
//! embedded session identifier (`extra`). The body is opaque.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::constants::FRAME_HEADER_SIZE;
use crate::core::{FrameError, SessionKey};

/// Message frame header.
///
/// Wire format (12 bytes):
/// ```text
/// +------------------+------------------+------------------+
/// | Message ID       | Extra            | Body Length      |
/// | 4 bytes (LE32)   | 4 bytes (LE32)   | 4 bytes (LE32)   |
/// +------------------+------------------+------------------+
/// ```
///
/// `extra` carries the id of the session the frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Application message id.
    pub msg_id: i32,
    /// Session identifier.
    pub extra: SessionKey,
    /// Length of the body that follows the header.
    pub body_len: i32,
}

impl FrameHeader {
    /// Serialize header to bytes (12 bytes).
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.msg_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.extra.to_le_bytes());
        buf[8..12].copy_from_slice(&self.body_len.to_le_bytes());
        buf
    }

    /// Parse header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: FRAME_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let msg_id = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let extra = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let body_len = i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        Ok(Self {
            msg_id,
            extra,
            body_len,
        })
    }
}

/// A structurally valid message frame.
///
/// Holding a `MessageFrame` means the validity check passed: the header is
/// present and its body length matches the buffer exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    header: FrameHeader,
    raw: Bytes,
}

impl MessageFrame {
    /// Parse and validate a received datagram.
    pub fn parse(raw: Bytes) -> Result<Self, FrameError> {
        let header = FrameHeader::from_bytes(&raw)?;
        let actual = raw.len() - FRAME_HEADER_SIZE;

        if header.body_len < 0 || header.body_len as usize != actual {
            return Err(FrameError::LengthMismatch {
                declared: header.body_len,
                actual,
            });
        }

        Ok(Self { header, raw })
    }

    /// Check a buffer without keeping it.
    pub fn is_valid(bytes: &[u8]) -> bool {
        FrameHeader::from_bytes(bytes)
            .map(|h| h.body_len >= 0 && h.body_len as usize == bytes.len() - FRAME_HEADER_SIZE)
            .unwrap_or(false)
    }

    /// Build a frame for `extra` carrying `body`.
    pub fn encode(msg_id: i32, extra: SessionKey, body: &[u8]) -> Result<Self, FrameError> {
        let body_len = i32::try_from(body.len()).map_err(|_| FrameError::BodyTooLarge(body.len()))?;
        let header = FrameHeader {
            msg_id,
            extra,
            body_len,
        };

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + body.len());
        buf.put_slice(&header.to_bytes());
        buf.put_slice(body);

        Ok(Self {
            header,
            raw: buf.freeze(),
        })
    }

    /// Frame header.
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    /// Application message id.
    pub fn msg_id(&self) -> i32 {
        self.header.msg_id
    }

    /// Session id embedded in the frame.
    pub fn extra(&self) -> SessionKey {
        self.header.extra
    }

    /// Frame body.
    pub fn body(&self) -> Bytes {
        self.raw.slice(FRAME_HEADER_SIZE..)
    }

    /// Complete wire bytes (header and body).
    pub fn to_bytes(&self) -> Bytes {
        self.raw.clone()
    }

    /// Total size on the wire.
    pub fn wire_len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the frame carries a non-empty body.
    pub fn has_body(&self) -> bool {
        self.header.body_len > 0
    }
}
