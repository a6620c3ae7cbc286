//! Outbound message queue.
//!
//! Application code pushes [`OutboundMessage`]s from any thread; the send
//! loop is the single consumer. The queue is an unbounded channel, so a
//! slow socket write never blocks producers.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::frame::MessageFrame;
use crate::core::constants::PING_BYTE;
use crate::core::{Session, TransportError, TransportResult};

/// An immutable payload bound to a destination session.
///
/// Consumed exactly once by the send loop.
pub struct OutboundMessage<S> {
    payload: Bytes,
    session: Arc<S>,
}

impl<S: Session> OutboundMessage<S> {
    /// Create a message carrying raw bytes.
    pub fn new(payload: impl Into<Bytes>, session: Arc<S>) -> Self {
        Self {
            payload: payload.into(),
            session,
        }
    }

    /// Create a liveness probe for `session`.
    pub fn ping(session: Arc<S>) -> Self {
        Self::new(Bytes::from_static(&[PING_BYTE]), session)
    }

    /// Create a message carrying an encoded frame.
    pub fn from_frame(frame: &MessageFrame, session: Arc<S>) -> Self {
        Self::new(frame.to_bytes(), session)
    }

    /// Payload bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Target session.
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// Peer endpoint to write to, resolved at send time.
    pub fn destination(&self) -> TransportResult<SocketAddr> {
        self.session
            .bound_endpoint()
            .ok_or(TransportError::NoDestination {
                session: self.session.id(),
            })
    }
}

impl<S: Session> fmt::Debug for OutboundMessage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundMessage")
            .field("session", &self.session.id())
            .field("len", &self.payload.len())
            .finish()
    }
}

/// Producer side of the outbound queue.
pub struct OutboundQueue<S> {
    tx: mpsc::UnboundedSender<OutboundMessage<S>>,
}

impl<S> Clone for OutboundQueue<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: Session> OutboundQueue<S> {
    /// Enqueue a message.
    ///
    /// Fails with [`TransportError::Closed`] once the consumer is gone.
    pub fn push(&self, message: OutboundMessage<S>) -> TransportResult<()> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }

    /// Whether the consumer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the outbound queue, owned by the send loop.
pub struct OutboundDrain<S> {
    rx: mpsc::UnboundedReceiver<OutboundMessage<S>>,
}

impl<S: Session> OutboundDrain<S> {
    /// Wait for the next message. Returns `None` when every producer is gone.
    pub async fn recv(&mut self) -> Option<OutboundMessage<S>> {
        self.rx.recv().await
    }

    /// Take every message already queued, in arrival order, after `first`.
    ///
    /// Messages pushed while the batch is being written land in the next
    /// batch.
    pub fn batch(&mut self, first: OutboundMessage<S>) -> Vec<OutboundMessage<S>> {
        let mut batch = Vec::with_capacity(1 + self.rx.len());
        batch.push(first);
        while let Ok(message) = self.rx.try_recv() {
            batch.push(message);
        }
        batch
    }

    /// Number of messages waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Stop accepting messages and discard what is queued.
    pub fn close(&mut self) {
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

/// Create a connected queue pair.
pub fn outbound_queue<S: Session>() -> (OutboundQueue<S>, OutboundDrain<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundQueue { tx }, OutboundDrain { rx })
}
