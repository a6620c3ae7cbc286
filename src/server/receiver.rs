//! Receive loop.
//!
//! Classifies each inbound datagram by shape, then routes it: pong or
//! echo for pings, endpoint binding for handshakes, and frame or
//! pass-through dispatch for everything else.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::event::{LoopRole, ServiceEvent, absorb};
use crate::core::{Session, SessionKey, SessionRegistry, TransportResult};
use crate::transport::{DatagramSocket, Inbound, MessageFrame, Mode};

/// State owned by the receive loop.
pub(crate) struct Receiver<R: SessionRegistry> {
    pub(crate) socket: DatagramSocket,
    pub(crate) registry: Arc<R>,
    pub(crate) mode: Mode,
    pub(crate) trust_frame_identity: bool,
    pub(crate) events: mpsc::Sender<ServiceEvent<R::Session>>,
    pub(crate) cancel: CancellationToken,
}

impl<R: SessionRegistry> Receiver<R> {
    /// Run until cancelled or until an unexpected error.
    pub(crate) async fn run(mut self) -> TransportResult<()> {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                received = self.socket.recv_from() => {
                    received.map(|(data, peer)| (Bytes::copy_from_slice(data), peer))
                }
            };

            let result = match received {
                Ok((data, peer)) => self.handle_datagram(data, peer).await,
                Err(e) => Err(e.into()),
            };
            absorb(LoopRole::Receive, result)?;
        }

        trace!("receive loop stopped");
        Ok(())
    }

    /// Process one datagram.
    pub(crate) async fn handle_datagram(&self, data: Bytes, peer: SocketAddr) -> TransportResult<()> {
        let handshake = match self.mode.classify(&data) {
            Inbound::Empty => return Ok(()),
            Inbound::Ping => return self.handle_ping(&data, peer).await,
            Inbound::Payload { handshake, .. } => handshake,
        };

        // A handshake routes by its claimed id only; unknown ids go nowhere.
        let session = match handshake {
            Some(id) => self.handle_handshake(id, peer).await,
            None => self.registry.resolve_by_endpoint(&peer),
        };

        match self.mode {
            Mode::Native => self.dispatch_frame(data, session).await,
            Mode::PassThrough => {
                if let Some(session) = session {
                    session.on_pass_through_receive(&data);
                }
                Ok(())
            }
        }
    }

    /// Pong for an outstanding probe, otherwise echo the marker back.
    async fn handle_ping(&self, data: &[u8], peer: SocketAddr) -> TransportResult<()> {
        match self.registry.resolve_by_endpoint(&peer) {
            Some(session) if session.is_pinging() => {
                session.on_ping();
                trace!(session = session.id(), "pong");
            }
            _ => {
                self.socket.send_to(data, peer).await?;
                trace!(peer = %peer, "ping echoed");
            }
        }
        Ok(())
    }

    /// Bind the claimed session to `peer` when its endpoint is new.
    async fn handle_handshake(
        &self,
        id: SessionKey,
        peer: SocketAddr,
    ) -> Option<Arc<R::Session>> {
        let session = self.registry.resolve_by_id(id)?;

        if session.bound_endpoint() != Some(peer) {
            session.bind_endpoint(peer);
            debug!(session = id, peer = %peer, "session endpoint bound");
            self.emit(ServiceEvent::Connected {
                session: Arc::clone(&session),
            })
            .await;
        }

        Some(session)
    }

    /// Parse a native frame and raise it for its session.
    ///
    /// Invalid frames and frames for unknown sessions are dropped silently.
    async fn dispatch_frame(
        &self,
        data: Bytes,
        by_endpoint: Option<Arc<R::Session>>,
    ) -> TransportResult<()> {
        let Ok(frame) = MessageFrame::parse(data) else {
            return Ok(());
        };

        let session = match by_endpoint {
            Some(session) if session.id() == frame.extra() => Some(session),
            _ if !self.trust_frame_identity => None,
            _ => self.registry.resolve_by_id(frame.extra()),
        };

        if let Some(session) = session {
            self.emit(ServiceEvent::Received { frame, session }).await;
        }
        Ok(())
    }

    /// Deliver an event, giving up if the service is stopping.
    async fn emit(&self, event: ServiceEvent<R::Session>) {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = self.events.send(event) => {}
        }
    }
}
