//! In-memory session registry.
//!
//! [`SessionTable`] is a ready-made [`SessionRegistry`] for applications
//! that do not bring their own. Each [`UdpSession`] tracks:
//! - Bound peer endpoint (set by the handshake, updated on roaming)
//! - Liveness probing and the last measured round trip
//! - Pass-through inbox (bounded) and outbox

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::Rng;
use tracing::trace;

use crate::core::constants::MAX_PASS_THROUGH_BACKLOG;
use crate::core::{
    OutboundDatagram, Session, SessionKey, SessionRegistry, TransportError, TransportResult,
};

#[derive(Debug)]
struct SessionInner {
    endpoint: Option<SocketAddr>,
    ping_sent_at: Option<Instant>,
    last_rtt: Option<Duration>,
    inbox: VecDeque<Bytes>,
    outbox: VecDeque<Bytes>,
}

/// Per-client session.
#[derive(Debug)]
pub struct UdpSession {
    /// Session ID.
    id: SessionKey,

    /// Mutable state, guarded for the receive loop and the application.
    inner: Mutex<SessionInner>,
}

impl UdpSession {
    /// Create a new, unbound session.
    pub fn new(id: SessionKey) -> Self {
        Self {
            id,
            inner: Mutex::new(SessionInner {
                endpoint: None,
                ping_sent_at: None,
                last_rtt: None,
                inbox: VecDeque::new(),
                outbox: VecDeque::new(),
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a liveness probe as outstanding.
    ///
    /// The caller sends the probe itself, usually with
    /// [`OutboundMessage::ping`](crate::transport::OutboundMessage::ping).
    pub fn begin_ping(&self) {
        self.inner().ping_sent_at = Some(Instant::now());
    }

    /// Round trip of the last answered probe.
    pub fn last_rtt(&self) -> Option<Duration> {
        self.inner().last_rtt
    }

    /// Take every pass-through datagram received so far, oldest first.
    ///
    /// At most [`MAX_PASS_THROUGH_BACKLOG`] are held between drains.
    pub fn drain_pass_through(&self) -> Vec<Bytes> {
        self.inner().inbox.drain(..).collect()
    }

    /// Queue pass-through bytes for the next maintenance tick.
    ///
    /// Unbounded: the outbox is filled only by the application.
    pub fn queue_pass_through(&self, data: impl Into<Bytes>) {
        self.inner().outbox.push_back(data.into());
    }

    /// Take pending pass-through output, if the session has an endpoint.
    fn take_pass_through_output(&self) -> Option<(SocketAddr, Vec<Bytes>)> {
        let mut inner = self.inner();
        let endpoint = inner.endpoint?;
        if inner.outbox.is_empty() {
            return None;
        }
        Some((endpoint, inner.outbox.drain(..).collect()))
    }
}

impl Session for UdpSession {
    fn id(&self) -> SessionKey {
        self.id
    }

    fn bound_endpoint(&self) -> Option<SocketAddr> {
        self.inner().endpoint
    }

    fn bind_endpoint(&self, addr: SocketAddr) {
        self.inner().endpoint = Some(addr);
    }

    fn is_pinging(&self) -> bool {
        self.inner().ping_sent_at.is_some()
    }

    fn on_ping(&self) {
        let mut inner = self.inner();
        if let Some(sent) = inner.ping_sent_at.take() {
            inner.last_rtt = Some(sent.elapsed());
        }
    }

    fn on_pass_through_receive(&self, data: &[u8]) {
        let mut inner = self.inner();
        if inner.inbox.len() >= MAX_PASS_THROUGH_BACKLOG {
            trace!(session = self.id, len = data.len(), "pass-through backlog full, dropped");
            return;
        }
        inner.inbox.push_back(Bytes::copy_from_slice(data));
    }
}

/// Thread-safe table of [`UdpSession`]s keyed by id.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<SessionKey, Arc<UdpSession>>>,
}

impl SessionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under a given id, replacing any previous one.
    pub fn insert(&self, id: SessionKey) -> Arc<UdpSession> {
        let session = Arc::new(UdpSession::new(id));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&session));
        session
    }

    /// Register a session under a random unused positive id.
    pub fn create(&self) -> Arc<UdpSession> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let mut rng = rand::thread_rng();
        let id = loop {
            let candidate: SessionKey = rng.gen_range(1..=SessionKey::MAX);
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = Arc::new(UdpSession::new(id));
        sessions.insert(id, Arc::clone(&session));
        session
    }

    /// Remove a session.
    pub fn remove(&self, id: SessionKey) -> TransportResult<Arc<UdpSession>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(TransportError::UnknownSession)
    }

    /// Snapshot of every session with a bound endpoint.
    pub fn bound_sessions(&self) -> Vec<Arc<UdpSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.bound_endpoint().is_some())
            .cloned()
            .collect()
    }

    /// Get the number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionRegistry for SessionTable {
    type Session = UdpSession;

    fn resolve_by_endpoint(&self, addr: &SocketAddr) -> Option<Arc<UdpSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|s| s.bound_endpoint() == Some(*addr))
            .cloned()
    }

    fn resolve_by_id(&self, id: SessionKey) -> Option<Arc<UdpSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn tick_pass_through(&self, _now: Instant) -> TransportResult<Vec<OutboundDatagram>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::new();
        for session in sessions.values() {
            if let Some((target, payloads)) = session.take_pass_through_output() {
                out.extend(
                    payloads
                        .into_iter()
                        .map(|payload| OutboundDatagram { target, payload }),
                );
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_bind_and_resolve() {
        let table = SessionTable::new();
        let session = table.insert(42);
        assert!(table.resolve_by_endpoint(&addr("10.0.0.5:9000")).is_none());

        session.bind_endpoint(addr("10.0.0.5:9000"));

        let found = table.resolve_by_endpoint(&addr("10.0.0.5:9000")).unwrap();
        assert_eq!(found.id(), 42);
        assert_eq!(table.resolve_by_id(42).unwrap().id(), 42);
        assert!(table.resolve_by_id(43).is_none());
    }

    #[test]
    fn test_create_unique_ids() {
        let table = SessionTable::new();
        let a = table.create();
        let b = table.create();

        assert_ne!(a.id(), b.id());
        assert!(table.bound_sessions().is_empty());
        assert!(a.id() > 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove() {
        let table = SessionTable::new();
        table.insert(1);
        assert!(table.remove(1).is_ok());
        assert!(table.is_empty());
        assert!(matches!(table.remove(1), Err(TransportError::UnknownSession)));
    }

    #[test]
    fn test_ping_cycle() {
        let session = UdpSession::new(5);
        assert!(!session.is_pinging());
        assert!(session.last_rtt().is_none());

        session.begin_ping();
        assert!(session.is_pinging());

        session.on_ping();
        assert!(!session.is_pinging());
        assert!(session.last_rtt().is_some());
    }

    #[test]
    fn test_pass_through_inbox() {
        let session = UdpSession::new(5);
        session.on_pass_through_receive(b"one");
        session.on_pass_through_receive(b"two");

        let drained = session.drain_pass_through();
        assert_eq!(drained, vec![Bytes::from("one"), Bytes::from("two")]);
        assert!(session.drain_pass_through().is_empty());
    }

    #[test]
    fn test_pass_through_inbox_is_bounded() {
        let session = UdpSession::new(5);
        for i in 0..MAX_PASS_THROUGH_BACKLOG + 10 {
            session.on_pass_through_receive(&(i as u32).to_le_bytes());
        }

        let drained = session.drain_pass_through();
        assert_eq!(drained.len(), MAX_PASS_THROUGH_BACKLOG);
        assert_eq!(drained[0], Bytes::copy_from_slice(&0u32.to_le_bytes()));

        // Space frees up once drained.
        session.on_pass_through_receive(b"again");
        assert_eq!(session.drain_pass_through(), vec![Bytes::from("again")]);
    }

    #[test]
    fn test_tick_skips_unbound_sessions() {
        let table = SessionTable::new();
        let bound = table.insert(1);
        let unbound = table.insert(2);

        bound.bind_endpoint(addr("127.0.0.1:7000"));
        bound.queue_pass_through(&b"seg"[..]);
        unbound.queue_pass_through(&b"held"[..]);

        let out = table.tick_pass_through(Instant::now()).unwrap();
        assert_eq!(
            out,
            vec![OutboundDatagram::new(addr("127.0.0.1:7000"), &b"seg"[..])]
        );

        // Unbound output stays queued until the session has an endpoint.
        unbound.bind_endpoint(addr("127.0.0.1:7001"));
        let out = table.tick_pass_through(Instant::now()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, addr("127.0.0.1:7001"));
    }
}
