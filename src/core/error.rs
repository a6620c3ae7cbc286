//! Error types for FrameNet.
//!
//! Errors fall in three classes that drive the loop policy:
//!
//! - **transient**: any socket error from a single datagram (ICMP
//!   unreachable echoes, resets, oversized payloads), logged and absorbed
//! - **silent drop**: malformed or unroutable input, dropped without a log
//! - **fatal**: everything else, reported and terminates the owning loop

use std::io;

use thiserror::Error;

use super::traits::SessionKey;

/// Message frame structural errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer is shorter than the frame header.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// Declared body length disagrees with the buffer.
    #[error("frame length mismatch: header declares {declared} body bytes, buffer holds {actual}")]
    LengthMismatch {
        /// Body length from the header.
        declared: i32,
        /// Body bytes actually present.
        actual: usize,
    },

    /// Body does not fit the header's length field.
    #[error("frame body too large: {0} bytes")]
    BodyTooLarge(usize),
}

/// Transport and service errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Frame structure error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The target session has no bound peer endpoint.
    #[error("session {session} has no bound endpoint")]
    NoDestination {
        /// Session the message was addressed to.
        session: SessionKey,
    },

    /// No session matches an identifier or endpoint.
    #[error("unknown session")]
    UnknownSession,

    /// The pass-through protocol reported a failure during a tick.
    #[error("pass-through error: {0}")]
    PassThrough(String),

    /// Failed to bind the socket.
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// Operation not available in the service's wire mode.
    #[error("unsupported in this mode: {0}")]
    Unsupported(&'static str),

    /// Service has been stopped.
    #[error("service closed")]
    Closed,

    /// A loop task panicked, usually inside a session or registry callback.
    #[error("loop panicked: {0}")]
    Panicked(String),
}

impl TransportError {
    /// Check if this error is ordinary UDP noise that must not stop a loop.
    ///
    /// Every socket error is scoped to the one datagram that raised it, so
    /// all I/O errors count, as do messages whose destination is not known
    /// yet.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_) | TransportError::NoDestination { .. }
        )
    }

    /// Check if this error should result in a silent drop (no log, no reply).
    pub fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            TransportError::Frame(_) | TransportError::UnknownSession
        )
    }

    /// Check if this error terminates the loop that raised it.
    pub fn is_fatal(&self) -> bool {
        !self.is_transient() && !self.is_silent_drop()
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
