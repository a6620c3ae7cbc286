//! FrameNet Echo Example
//!
//! Echoes every frame (native mode) or every raw datagram (pass-through
//! mode) back to the session that sent it. Sessions are registered on
//! their first handshake.
//!
//! Environment variables:
//! - FRAMENET_BIND_ADDR: Bind address (default 0.0.0.0:20000)
//! - FRAMENET_MODE: "native" or "pass-through" (default native)
//! - FRAMENET_LOG_LEVEL: trace|debug|info|warn|error (default info)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use framenet::core::{OutboundDatagram, TransportResult};
use framenet::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum EchoError {
    #[error("invalid FRAMENET_BIND_ADDR {0:?}: {1}")]
    BindAddr(String, std::net::AddrParseError),

    #[error(transparent)]
    Mode(#[from] framenet::transport::ParseModeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Sessions the open table admits before refusing unknown ids.
const MAX_SESSIONS: usize = 4096;

/// Registry that admits any session id on first sight, up to
/// [`MAX_SESSIONS`].
#[derive(Default)]
struct OpenTable {
    sessions: SessionTable,
}

impl SessionRegistry for OpenTable {
    type Session = UdpSession;

    fn resolve_by_endpoint(&self, addr: &SocketAddr) -> Option<Arc<UdpSession>> {
        self.sessions.resolve_by_endpoint(addr)
    }

    fn resolve_by_id(&self, id: SessionKey) -> Option<Arc<UdpSession>> {
        self.sessions.resolve_by_id(id).or_else(|| {
            if self.sessions.len() >= MAX_SESSIONS {
                debug!(session = id, "session table full, id refused");
                return None;
            }
            Some(self.sessions.insert(id))
        })
    }

    fn tick_pass_through(&self, now: Instant) -> TransportResult<Vec<OutboundDatagram>> {
        self.sessions.tick_pass_through(now)
    }
}

fn config_from_env() -> Result<ServiceConfig, EchoError> {
    let mut builder = ServiceConfigBuilder::new();

    if let Ok(addr) = std::env::var("FRAMENET_BIND_ADDR") {
        let parsed = addr.parse().map_err(|e| EchoError::BindAddr(addr.clone(), e))?;
        builder = builder.bind_addr(parsed);
    }
    if let Ok(mode) = std::env::var("FRAMENET_MODE") {
        builder = builder.mode(mode.parse()?);
    }

    Ok(builder.build())
}

async fn run() -> Result<(), EchoError> {
    let config = config_from_env()?;
    let mode = config.mode;
    let registry = Arc::new(OpenTable::default());
    let (mut service, mut events) = UdpService::bind(config, Arc::clone(&registry)).await?;
    service.start();
    info!(addr = %service.local_addr(), mode = %mode, "echo server listening");

    let mut echo_tick = tokio::time::interval(Duration::from_millis(10));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(ServiceEvent::Connected { session }) => {
                    info!(session = session.id(), peer = ?session.bound_endpoint(), "connected");
                }
                Some(ServiceEvent::Received { frame, session }) => {
                    if let Err(e) = service.send(OutboundMessage::from_frame(&frame, session)) {
                        warn!(error = %e, "echo dropped");
                    }
                }
                Some(ServiceEvent::Fatal { role, error }) => {
                    error!(role = %role, error = %error, "loop failed, shutting down");
                    break;
                }
                None => break,
            },
            _ = echo_tick.tick(), if mode == Mode::PassThrough => {
                for session in registry.sessions.bound_sessions() {
                    for data in session.drain_pass_through() {
                        session.queue_pass_through(data);
                    }
                }
            }
        }
    }

    service.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let level = std::env::var("FRAMENET_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "echo server failed");
        std::process::exit(1);
    }
}
