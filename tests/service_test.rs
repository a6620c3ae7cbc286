//! End-to-end tests driving a running service over loopback sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use framenet::core::constants::{PASS_THROUGH_HANDSHAKE_SIZE, PING_BYTE};
use framenet::core::{OutboundDatagram, TransportError, TransportResult};
use framenet::prelude::*;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn config(mode: Mode) -> ServiceConfig {
    ServiceConfigBuilder::new()
        .bind_addr("127.0.0.1:0".parse().unwrap())
        .mode(mode)
        .tick_interval(Duration::from_millis(2))
        .build()
}

async fn start<R: SessionRegistry>(
    mode: Mode,
    registry: Arc<R>,
) -> (UdpService<R>, EventStream<R::Session>) {
    let (mut service, events) = UdpService::bind(config(mode), registry).await.unwrap();
    assert!(service.start());
    (service, events)
}

async fn client() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

async fn recv(socket: &UdpSocket) -> Vec<u8> {
    let mut buf = [0u8; 2048];
    let (len, _) = timeout(WAIT, socket.recv_from(&mut buf))
        .await
        .expect("datagram within timeout")
        .unwrap();
    buf[..len].to_vec()
}

async fn next_event<S: Session>(events: &mut EventStream<S>) -> ServiceEvent<S> {
    timeout(WAIT, events.recv())
        .await
        .expect("event within timeout")
        .expect("event stream open")
}

#[tokio::test]
async fn handshake_binds_session_and_fires_connected_once() {
    let registry = Arc::new(SessionTable::new());
    let session = registry.insert(42);
    let (mut service, mut events) = start(Mode::Native, Arc::clone(&registry)).await;
    let (client, client_addr) = client().await;

    client
        .send_to(&42i32.to_le_bytes(), service.local_addr())
        .await
        .unwrap();

    match next_event(&mut events).await {
        ServiceEvent::Connected { session } => assert_eq!(session.id(), 42),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(session.bound_endpoint(), Some(client_addr));

    // Repeat from the same endpoint, then ping so we know it was processed.
    client
        .send_to(&42i32.to_le_bytes(), service.local_addr())
        .await
        .unwrap();
    client
        .send_to(&[PING_BYTE], service.local_addr())
        .await
        .unwrap();
    assert_eq!(recv(&client).await, vec![PING_BYTE]);
    assert!(events.try_recv().is_err());

    service.stop().await;
}

#[tokio::test]
async fn unsolicited_ping_is_echoed() {
    let (mut service, _events) = start(Mode::Native, Arc::new(SessionTable::new())).await;
    let (client, _) = client().await;

    client
        .send_to(&[PING_BYTE], service.local_addr())
        .await
        .unwrap();
    assert_eq!(recv(&client).await, vec![PING_BYTE]);

    service.stop().await;
}

#[tokio::test]
async fn pong_is_recorded_for_pinging_session() {
    let registry = Arc::new(SessionTable::new());
    let session = registry.insert(5);
    let (mut service, _events) = start(Mode::Native, Arc::clone(&registry)).await;
    let (client, client_addr) = client().await;
    session.bind_endpoint(client_addr);

    session.begin_ping();
    service
        .send(OutboundMessage::ping(Arc::clone(&session)))
        .unwrap();
    assert_eq!(recv(&client).await, vec![PING_BYTE]);

    client
        .send_to(&[PING_BYTE], service.local_addr())
        .await
        .unwrap();

    let deadline = Instant::now() + WAIT;
    while session.is_pinging() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!session.is_pinging());
    assert!(session.last_rtt().is_some());

    service.stop().await;
}

#[tokio::test]
async fn malformed_frames_are_dropped_silently() {
    let registry = Arc::new(SessionTable::new());
    registry.insert(9);
    let (mut service, mut events) = start(Mode::Native, registry).await;
    let (client, _) = client().await;

    let good = MessageFrame::encode(2, 9, b"payload").unwrap().to_bytes();
    let truncated = &good[..good.len() - 1];

    client.send_to(truncated, service.local_addr()).await.unwrap();
    client.send_to(&good, service.local_addr()).await.unwrap();

    match next_event(&mut events).await {
        ServiceEvent::Received { frame, session } => {
            assert_eq!(session.id(), 9);
            assert_eq!(frame.msg_id(), 2);
            assert_eq!(&frame.body()[..], b"payload");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(service.is_active());

    service.stop().await;
}

#[tokio::test]
async fn queued_messages_drain_in_order() {
    let registry = Arc::new(SessionTable::new());
    let session = registry.insert(1);
    let (client, client_addr) = client().await;
    session.bind_endpoint(client_addr);

    let (mut service, _events) = UdpService::bind(config(Mode::Native), Arc::clone(&registry))
        .await
        .unwrap();

    for i in 0..10i32 {
        let frame = MessageFrame::encode(i, 1, &i.to_le_bytes()).unwrap();
        service
            .send(OutboundMessage::from_frame(&frame, Arc::clone(&session)))
            .unwrap();
    }
    assert!(service.start());

    for i in 0..10i32 {
        let frame = MessageFrame::parse(Bytes::from(recv(&client).await)).unwrap();
        assert_eq!(frame.msg_id(), i);
    }

    service.stop().await;
}

#[tokio::test]
async fn echo_round_trip_through_queue_handle() {
    let registry = Arc::new(SessionTable::new());
    registry.insert(77);
    let (mut service, mut events) = start(Mode::Native, registry).await;
    let queue = service.queue();
    let (client, _) = client().await;

    client
        .send_to(&77i32.to_le_bytes(), service.local_addr())
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ServiceEvent::Connected { .. }
    ));

    let request = MessageFrame::encode(10, 77, b"marco").unwrap();
    client
        .send_to(&request.to_bytes(), service.local_addr())
        .await
        .unwrap();

    let ServiceEvent::Received { frame, session } = next_event(&mut events).await else {
        panic!("expected a frame");
    };
    let reply = MessageFrame::encode(frame.msg_id() + 1, session.id(), b"polo").unwrap();
    queue
        .push(OutboundMessage::from_frame(&reply, session))
        .unwrap();

    let got = MessageFrame::parse(Bytes::from(recv(&client).await)).unwrap();
    assert_eq!(got.msg_id(), 11);
    assert_eq!(&got.body()[..], b"polo");

    service.stop().await;
}

#[tokio::test]
async fn pass_through_forwards_raw_datagrams() {
    let registry = Arc::new(SessionTable::new());
    let session = registry.insert(3);
    let (mut service, mut events) = start(Mode::PassThrough, Arc::clone(&registry)).await;
    let (client, client_addr) = client().await;

    // 28-byte datagram carrying the conversation id binds the session.
    let mut segment = vec![0xABu8; PASS_THROUGH_HANDSHAKE_SIZE];
    segment[..4].copy_from_slice(&3i32.to_le_bytes());
    client
        .send_to(&segment, service.local_addr())
        .await
        .unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        ServiceEvent::Connected { .. }
    ));
    assert_eq!(session.bound_endpoint(), Some(client_addr));

    let deadline = Instant::now() + WAIT;
    let mut inbox = Vec::new();
    while inbox.is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
        inbox = session.drain_pass_through();
    }
    assert_eq!(inbox, vec![Bytes::from(segment)]);

    // Output produced by the protocol goes out on the next tick.
    session.queue_pass_through(&b"ack"[..]);
    assert_eq!(recv(&client).await, b"ack".to_vec());

    service.stop().await;
}

struct FailingTicks {
    inner: SessionTable,
}

impl SessionRegistry for FailingTicks {
    type Session = UdpSession;

    fn resolve_by_endpoint(&self, addr: &SocketAddr) -> Option<Arc<UdpSession>> {
        self.inner.resolve_by_endpoint(addr)
    }

    fn resolve_by_id(&self, id: SessionKey) -> Option<Arc<UdpSession>> {
        self.inner.resolve_by_id(id)
    }

    fn tick_pass_through(&self, _now: Instant) -> TransportResult<Vec<OutboundDatagram>> {
        Err(TransportError::PassThrough("protocol engine poisoned".into()))
    }
}

#[tokio::test]
async fn fatal_loop_error_is_reported() {
    let registry = Arc::new(FailingTicks {
        inner: SessionTable::new(),
    });
    let (mut service, mut events) = start(Mode::PassThrough, registry).await;

    match next_event(&mut events).await {
        ServiceEvent::Fatal { role, error } => {
            assert_eq!(role, LoopRole::Send);
            assert!(matches!(error, TransportError::PassThrough(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(!service.is_active());

    // The receive loop keeps answering until stop.
    let (client, _) = client().await;
    client
        .send_to(&[PING_BYTE], service.local_addr())
        .await
        .unwrap();
    assert_eq!(recv(&client).await, vec![PING_BYTE]);

    service.stop().await;
}

#[tokio::test]
async fn stop_closes_event_stream_and_rejects_sends() {
    let registry = Arc::new(SessionTable::new());
    let session = registry.insert(1);
    let (mut service, mut events) = start(Mode::Native, registry).await;

    service.stop().await;
    assert!(!service.is_active());

    let closed = timeout(WAIT, events.recv()).await.unwrap();
    assert!(closed.is_none());

    assert!(matches!(
        service.send(OutboundMessage::new(&b"late"[..], session)),
        Err(TransportError::Closed)
    ));
}

#[tokio::test]
async fn roaming_session_rebinds() {
    let registry = Arc::new(SessionTable::new());
    let session = registry.insert(12);
    let (mut service, mut events) = start(Mode::Native, Arc::clone(&registry)).await;

    let (first, first_addr) = client().await;
    first
        .send_to(&12i32.to_le_bytes(), service.local_addr())
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ServiceEvent::Connected { .. }
    ));
    assert_eq!(session.bound_endpoint(), Some(first_addr));

    let (second, second_addr) = client().await;
    second
        .send_to(&12i32.to_le_bytes(), service.local_addr())
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ServiceEvent::Connected { .. }
    ));
    assert_eq!(session.bound_endpoint(), Some(second_addr));

    service.stop().await;
}

#[tokio::test]
async fn oversized_message_does_not_stop_send_loop() {
    let registry = Arc::new(SessionTable::new());
    let session = registry.insert(1);
    let (client, client_addr) = client().await;
    session.bind_endpoint(client_addr);
    let (mut service, mut events) = start(Mode::Native, Arc::clone(&registry)).await;

    // Larger than any UDP payload; the kernel rejects it with EMSGSIZE.
    service
        .send(OutboundMessage::new(vec![0u8; 70_000], Arc::clone(&session)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    service
        .send(OutboundMessage::new(&b"after"[..], session))
        .unwrap();

    assert_eq!(recv(&client).await, b"after".to_vec());
    assert!(service.is_active());
    assert!(events.try_recv().is_err());

    service.stop().await;
}

#[tokio::test]
async fn zero_tick_interval_is_raised_to_minimum() {
    let registry = Arc::new(SessionTable::new());
    let session = registry.insert(4);
    let (client, client_addr) = client().await;
    session.bind_endpoint(client_addr);

    let mut zero = config(Mode::PassThrough);
    zero.tick_interval = Duration::ZERO;
    let (mut service, _events) = UdpService::bind(zero, Arc::clone(&registry))
        .await
        .unwrap();
    assert!(service.config().tick_interval > Duration::ZERO);
    assert!(service.start());

    session.queue_pass_through(&b"tick"[..]);
    assert_eq!(recv(&client).await, b"tick".to_vec());
    assert!(service.is_active());

    service.stop().await;
}

struct PanickingTicks {
    inner: SessionTable,
}

impl SessionRegistry for PanickingTicks {
    type Session = UdpSession;

    fn resolve_by_endpoint(&self, addr: &SocketAddr) -> Option<Arc<UdpSession>> {
        self.inner.resolve_by_endpoint(addr)
    }

    fn resolve_by_id(&self, id: SessionKey) -> Option<Arc<UdpSession>> {
        self.inner.resolve_by_id(id)
    }

    fn tick_pass_through(&self, _now: Instant) -> TransportResult<Vec<OutboundDatagram>> {
        panic!("protocol engine bug");
    }
}

#[tokio::test]
async fn panicking_loop_is_reported_as_fatal() {
    let registry = Arc::new(PanickingTicks {
        inner: SessionTable::new(),
    });
    let (mut service, mut events) = start(Mode::PassThrough, registry).await;

    match next_event(&mut events).await {
        ServiceEvent::Fatal { role, error } => {
            assert_eq!(role, LoopRole::Send);
            assert!(matches!(error, TransportError::Panicked(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(!service.is_active());

    service.stop().await;
    assert!(service.is_stopped());
}

#[tokio::test]
async fn stop_releases_the_socket() {
    let (mut service, _events) = start(Mode::Native, Arc::new(SessionTable::new())).await;
    let addr = service.local_addr();

    service.stop().await;

    let rebound = UdpSocket::bind(addr).await;
    assert!(rebound.is_ok(), "address still held: {:?}", rebound.err());
}
