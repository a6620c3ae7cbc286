//! High-level FrameNet service API.
//!
//! Provides [`UdpService`], which owns one bound UDP socket and multiplexes
//! every session of a [`SessionRegistry`] over it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::config::ServiceConfig;
use super::event::{EventStream, LoopRole, ServiceEvent};
use super::receiver::Receiver;
use super::sender::Sender;
use crate::core::constants::MIN_TICK_INTERVAL;
use crate::core::{SessionRegistry, TransportError, TransportResult};
use crate::transport::{
    DatagramSocket, DatagramSocketBuilder, Mode, OutboundDrain, OutboundMessage, OutboundQueue,
    outbound_queue,
};

/// Resources bound at construction and handed to the loops on start.
struct Pending<R: SessionRegistry> {
    socket: DatagramSocket,
    drain: OutboundDrain<R::Session>,
    events: mpsc::Sender<ServiceEvent<R::Session>>,
}

enum Lifecycle<R: SessionRegistry> {
    /// Socket bound, loops not started.
    Bound(Pending<R>),
    /// Both loops spawned.
    Running {
        receive: JoinHandle<()>,
        send: JoinHandle<()>,
    },
    /// Stopped for good; a fresh service is required.
    Stopped,
}

/// A session-multiplexing UDP service.
///
/// Generic over the registry `R` that owns the sessions.
///
/// # Example
///
/// ```ignore
/// use framenet::server::{ServiceConfig, ServiceEvent, SessionTable, UdpService};
/// use framenet::transport::{Mode, OutboundMessage};
///
/// let registry = Arc::new(SessionTable::new());
/// let (mut service, mut events) =
///     UdpService::bind(ServiceConfig::new(20000, Mode::Native), registry).await?;
/// service.start();
///
/// while let Some(event) = events.recv().await {
///     match event {
///         ServiceEvent::Connected { session } => {
///             println!("session {} reachable", session.id());
///         }
///         ServiceEvent::Received { frame, session } => {
///             service.send(OutboundMessage::from_frame(&frame, session))?;
///         }
///         ServiceEvent::Fatal { role, error } => {
///             eprintln!("{role} loop failed: {error}");
///             break;
///         }
///     }
/// }
/// service.stop().await;
/// ```
pub struct UdpService<R: SessionRegistry> {
    /// Service configuration.
    config: ServiceConfig,

    /// Address the socket is bound to.
    local_addr: SocketAddr,

    /// Session owner.
    registry: Arc<R>,

    /// Producer side of the outbound queue.
    queue: OutboundQueue<R::Session>,

    /// Loop state.
    lifecycle: Lifecycle<R>,

    /// Set by a loop that terminated on an unexpected error.
    failed: Arc<AtomicBool>,

    /// Shared cancellation for both loops.
    cancel: CancellationToken,
}

impl<R: SessionRegistry> UdpService<R> {
    /// Bind the socket. Loops do not run until [`UdpService::start`].
    pub async fn bind(
        mut config: ServiceConfig,
        registry: Arc<R>,
    ) -> TransportResult<(Self, EventStream<R::Session>)> {
        config.tick_interval = config.tick_interval.max(MIN_TICK_INTERVAL);

        let socket = DatagramSocketBuilder::new()
            .recv_buffer_size(config.recv_buffer_size)
            .bind(config.bind_addr)
            .await
            .map_err(|e| TransportError::BindFailed(format!("{}: {}", config.bind_addr, e)))?;

        let local_addr = socket.local_addr()?;

        let (queue, drain) = outbound_queue();
        let (events, event_rx) = mpsc::channel(config.event_capacity.max(1));

        info!(addr = %local_addr, mode = %config.mode, "udp service bound");

        let service = Self {
            config,
            local_addr,
            registry,
            queue,
            lifecycle: Lifecycle::Bound(Pending {
                socket,
                drain,
                events,
            }),
            failed: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        };

        Ok((service, event_rx))
    }

    /// Launch the receive and send loops.
    ///
    /// Returns `true` if the loops are running afterwards, including when
    /// they already were. Returns `false` after [`UdpService::stop`], after a
    /// loop failed, or when called outside a tokio runtime.
    pub fn start(&mut self) -> bool {
        match &self.lifecycle {
            Lifecycle::Running { .. } => return self.is_active(),
            Lifecycle::Stopped => return false,
            Lifecycle::Bound(_) => {}
        }

        let Ok(runtime) = Handle::try_current() else {
            error!("start called outside a tokio runtime");
            return false;
        };

        let Lifecycle::Bound(pending) = std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped)
        else {
            return false;
        };

        let receiver = Receiver {
            socket: pending.socket,
            registry: Arc::clone(&self.registry),
            mode: self.config.mode,
            trust_frame_identity: self.config.trust_frame_identity,
            events: pending.events.clone(),
            cancel: self.cancel.clone(),
        };
        let sender = Sender {
            socket: receiver.socket.sender(),
            registry: Arc::clone(&self.registry),
            mode: self.config.mode,
            tick_interval: self.config.tick_interval,
            queue: pending.drain,
            cancel: self.cancel.clone(),
        };

        let receive = runtime.spawn(supervise(
            LoopRole::Receive,
            receiver.run(),
            pending.events.clone(),
            Arc::clone(&self.failed),
            self.cancel.clone(),
        ));
        let send = runtime.spawn(supervise(
            LoopRole::Send,
            sender.run(),
            pending.events,
            Arc::clone(&self.failed),
            self.cancel.clone(),
        ));

        self.lifecycle = Lifecycle::Running { receive, send };
        info!(addr = %self.local_addr, "udp service started");
        true
    }

    /// Enqueue a message for the send loop.
    ///
    /// Fails with [`TransportError::Closed`] after stop, and with
    /// [`TransportError::Unsupported`] in pass-through mode, where outbound
    /// traffic belongs to the pass-through protocol.
    pub fn send(&self, message: OutboundMessage<R::Session>) -> TransportResult<()> {
        if self.config.mode == Mode::PassThrough {
            return Err(TransportError::Unsupported(
                "outbound queue is unused in pass-through mode",
            ));
        }
        self.queue.push(message)
    }

    /// Get a cloneable queue handle for producers on other tasks or threads.
    pub fn queue(&self) -> OutboundQueue<R::Session> {
        self.queue.clone()
    }

    /// Stop both loops and close the socket.
    ///
    /// Queued messages are discarded. The service cannot be restarted.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running { receive, send } => {
                for (role, handle) in [(LoopRole::Receive, receive), (LoopRole::Send, send)] {
                    if let Err(e) = handle.await {
                        warn!(role = %role, error = %e, "loop task did not exit cleanly");
                    }
                }
            }
            Lifecycle::Bound(_) | Lifecycle::Stopped => {}
        }

        info!(addr = %self.local_addr, "udp service stopped");
    }

    /// Whether the socket is bound and both loops are healthy.
    pub fn is_active(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running { .. }) && !self.failed.load(Ordering::Acquire)
    }

    /// Whether [`UdpService::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Stopped)
    }

    /// Get the local address the service is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the bound local port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Get the wire mode.
    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Get the service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

impl<R: SessionRegistry> Drop for UdpService<R> {
    fn drop(&mut self) {
        // Loops exit on their own once cancelled.
        self.cancel.cancel();
    }
}

/// Run one loop and report a fatal exit on the event channel.
///
/// The loop runs as its own task so a panic surfaces here as a fatal error.
async fn supervise<S, F>(
    role: LoopRole,
    task: F,
    events: mpsc::Sender<ServiceEvent<S>>,
    failed: Arc<AtomicBool>,
    cancel: CancellationToken,
) where
    F: Future<Output = TransportResult<()>> + Send + 'static,
{
    let result = match tokio::spawn(task).await {
        Ok(result) => result,
        Err(e) => {
            error!(role = %role, error = %e, "loop task panicked");
            Err(TransportError::Panicked(e.to_string()))
        }
    };

    if let Err(error) = result {
        failed.store(true, Ordering::Release);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = events.send(ServiceEvent::Fatal { role, error }) => {}
        }
    }
}
