//! FrameNet - Transport Layer
//!
//! Building blocks the service is assembled from:
//!
//! - **Message frames**: [`MessageFrame`] with its validity check and
//!   embedded session id
//! - **Datagram classification**: [`Mode`] and [`Inbound`], selected once
//!   per service
//! - **Async sockets**: [`DatagramSocket`] / [`DatagramSender`] over tokio UDP
//! - **Outbound queue**: [`OutboundMessage`] with a single-consumer channel
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Application / Registry           │
//! ├─────────────────────────────────────────┤
//! │       Service (receive + send loop)     │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   frames, classification, queue         │
//! ├─────────────────────────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```

mod datagram;
mod frame;
mod queue;
mod socket;

pub use datagram::*;
pub use frame::*;
pub use queue::*;
pub use socket::*;
