//! Service configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::core::constants::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_PORT, DEFAULT_RECV_BUFFER_SIZE, DEFAULT_TICK_INTERVAL,
    MIN_TICK_INTERVAL,
};
use crate::transport::Mode;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,

    /// Wire mode, fixed for the lifetime of the service.
    pub mode: Mode,

    /// Receive buffer size (largest datagram accepted intact).
    pub recv_buffer_size: usize,

    /// Interval between pass-through maintenance ticks.
    ///
    /// Raised to [`MIN_TICK_INTERVAL`] when the service binds.
    pub tick_interval: Duration,

    /// Capacity of the event channel.
    pub event_capacity: usize,

    /// Let a frame's embedded session id override the session resolved
    /// from the sender's address.
    ///
    /// When `false`, frames are accepted only from the bound endpoint of
    /// the session they name.
    pub trust_frame_identity: bool,
}

impl ServiceConfig {
    /// Configuration for `port` on all interfaces in the given mode.
    pub fn new(port: u16, mode: Mode) -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            mode,
            ..Self::default()
        }
    }

    /// Bound local port.
    pub fn port(&self) -> u16 {
        self.bind_addr.port()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            mode: Mode::Native,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            trust_frame_identity: true,
        }
    }
}

/// Builder for a [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    /// Set the bind address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set only the port, keeping the bind IP.
    pub fn port(mut self, port: u16) -> Self {
        self.config.bind_addr.set_port(port);
        self
    }

    /// Set the wire mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Set the pass-through tick interval (at least [`MIN_TICK_INTERVAL`]).
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    /// Set the event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Trust or distrust frame-declared session ids.
    pub fn trust_frame_identity(mut self, trust: bool) -> Self {
        self.config.trust_frame_identity = trust;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
