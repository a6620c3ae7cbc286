//! Async UDP socket wrapper for the FrameNet transport.
//!
//! One [`DatagramSocket`] owns the receive side and its buffer; any number
//! of [`DatagramSender`] handles share the same socket for writes.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::core::constants::DEFAULT_RECV_BUFFER_SIZE;

/// Async UDP socket with an owned receive buffer.
#[derive(Debug)]
pub struct DatagramSocket {
    /// The underlying UDP socket.
    socket: Arc<UdpSocket>,
    /// Receive buffer.
    recv_buffer: Vec<u8>,
}

impl DatagramSocket {
    /// Create a socket bound to the given address.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        DatagramSocketBuilder::new().bind(addr).await
    }

    /// Create a socket from an existing UDP socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        DatagramSocketBuilder::new().from_socket(socket)
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive a datagram and return it with the sender's address.
    pub async fn recv_from(&mut self) -> io::Result<(&[u8], SocketAddr)> {
        let (len, addr) = self.socket.recv_from(&mut self.recv_buffer).await?;
        Ok((&self.recv_buffer[..len], addr))
    }

    /// Send data to a specific address.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, addr).await
    }

    /// Get a write handle sharing this socket.
    pub fn sender(&self) -> DatagramSender {
        DatagramSender {
            socket: Arc::clone(&self.socket),
        }
    }

    /// Receive buffer capacity; longer datagrams are truncated by the OS.
    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer.len()
    }
}

/// Cloneable write half of a [`DatagramSocket`].
#[derive(Debug, Clone)]
pub struct DatagramSender {
    socket: Arc<UdpSocket>,
}

impl DatagramSender {
    /// Send data to a specific address.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, addr).await
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Builder for creating sockets with custom options.
#[derive(Debug, Clone)]
pub struct DatagramSocketBuilder {
    recv_buffer_size: usize,
}

impl Default for DatagramSocketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramSocketBuilder {
    /// Create a new socket builder with default options.
    pub fn new() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        }
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Bind to the given address and create a socket.
    pub async fn bind(self, addr: SocketAddr) -> io::Result<DatagramSocket> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(self.from_socket(socket))
    }

    /// Create a socket from an existing UDP socket.
    pub fn from_socket(self, socket: UdpSocket) -> DatagramSocket {
        DatagramSocket {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; self.recv_buffer_size],
        }
    }
}
