//! Inbound datagram classification.
//!
//! The wire mode is chosen once when the service is built. Every received
//! datagram is classified by shape before any session lookup happens:
//!
//! ```text
//!   len == 0                 -> Empty      (ignored)
//!   len == 1 && [PING_BYTE]  -> Ping       (pong or echo)
//!   otherwise                -> Payload    (handshake id if the length
//!                                           matches the mode's handshake
//!                                           size, then frame/pass-through)
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::core::SessionKey;
use crate::core::constants::{HANDSHAKE_SIZE, PASS_THROUGH_HANDSHAKE_SIZE, PING_BYTE};

/// Wire mode of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Custom message framing; payloads are parsed as [`MessageFrame`]s.
    ///
    /// [`MessageFrame`]: super::MessageFrame
    #[default]
    Native,
    /// Raw bytes are handed to an external reliable-UDP protocol.
    PassThrough,
}

impl Mode {
    /// Whether a datagram of `len` bytes carries a handshake identifier.
    pub fn is_handshake_len(self, len: usize) -> bool {
        len == HANDSHAKE_SIZE || (self == Mode::PassThrough && len == PASS_THROUGH_HANDSHAKE_SIZE)
    }

    /// Classify a received datagram by shape.
    pub fn classify(self, data: &[u8]) -> Inbound<'_> {
        match data {
            [] => Inbound::Empty,
            [PING_BYTE] => Inbound::Ping,
            _ => {
                let handshake = if self.is_handshake_len(data.len()) {
                    Some(SessionKey::from_le_bytes([data[0], data[1], data[2], data[3]]))
                } else {
                    None
                };
                Inbound::Payload { data, handshake }
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Native => f.write_str("native"),
            Mode::PassThrough => f.write_str("pass-through"),
        }
    }
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown mode: {0:?} (expected \"native\" or \"pass-through\")")]
pub struct ParseModeError(String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "framed" => Ok(Mode::Native),
            "pass-through" | "passthrough" | "kcp" => Ok(Mode::PassThrough),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Shape of a received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Zero-length datagram.
    Empty,
    /// Single ping marker byte.
    Ping,
    /// Anything else.
    Payload {
        /// Raw datagram bytes.
        data: &'a [u8],
        /// Session id read from a handshake-sized datagram.
        handshake: Option<SessionKey>,
    },
}
