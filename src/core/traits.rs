//! Collaborator traits for FrameNet.
//!
//! The transport never owns sessions. It resolves them through a
//! [`SessionRegistry`] and talks to each one through the [`Session`] trait.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use super::error::TransportResult;

/// Numeric session identifier as carried on the wire (signed LE32).
pub type SessionKey = i32;

/// A logical, addressable peer tracked by a registry.
///
/// Implementations provide their own interior synchronization: the
/// receive loop calls [`Session::bind_endpoint`] without holding any lock
/// of its own.
pub trait Session: Send + Sync + 'static {
    /// Session identifier.
    fn id(&self) -> SessionKey;

    /// Peer endpoint this session is currently reachable at, if known.
    fn bound_endpoint(&self) -> Option<SocketAddr>;

    /// Bind (or re-bind after roaming) the peer endpoint.
    fn bind_endpoint(&self, addr: SocketAddr);

    /// Whether a liveness probe is outstanding for this session.
    fn is_pinging(&self) -> bool;

    /// Record the answer to an outstanding liveness probe.
    fn on_ping(&self);

    /// Ingest raw bytes for the pass-through (reliable-UDP) protocol.
    fn on_pass_through_receive(&self, data: &[u8]);
}

/// A datagram produced by the pass-through protocol, ready for the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundDatagram {
    /// Destination endpoint.
    pub target: SocketAddr,
    /// Raw bytes.
    pub payload: Bytes,
}

impl OutboundDatagram {
    /// Create a datagram for `target`.
    pub fn new(target: SocketAddr, payload: impl Into<Bytes>) -> Self {
        Self {
            target,
            payload: payload.into(),
        }
    }
}

/// Owner of the session set.
///
/// # Example
///
/// ```ignore
/// struct Rooms { sessions: RwLock<HashMap<SessionKey, Arc<Player>>> }
///
/// impl SessionRegistry for Rooms {
///     type Session = Player;
///
///     fn resolve_by_endpoint(&self, addr: &SocketAddr) -> Option<Arc<Player>> {
///         self.sessions.read().ok()?.values()
///             .find(|p| p.bound_endpoint() == Some(*addr))
///             .cloned()
///     }
///
///     fn resolve_by_id(&self, id: SessionKey) -> Option<Arc<Player>> {
///         self.sessions.read().ok()?.get(&id).cloned()
///     }
/// }
/// ```
pub trait SessionRegistry: Send + Sync + 'static {
    /// Concrete session type.
    type Session: Session;

    /// Find the session whose bound endpoint is `addr`.
    fn resolve_by_endpoint(&self, addr: &SocketAddr) -> Option<Arc<Self::Session>>;

    /// Find the session with identifier `id`.
    fn resolve_by_id(&self, id: SessionKey) -> Option<Arc<Self::Session>>;

    /// Drive one maintenance tick of the pass-through protocol.
    ///
    /// Called by the send loop in pass-through mode. Returned datagrams
    /// are written to the socket in order.
    fn tick_pass_through(&self, now: Instant) -> TransportResult<Vec<OutboundDatagram>> {
        let _ = now;
        Ok(Vec::new())
    }
}
