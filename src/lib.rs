//! # FrameNet
//!
//! A connectionless transport that multiplexes many logical client
//! sessions over a single UDP socket. It provides:
//!
//! - **Address discovery**: a 4-byte handshake binds a session id to the
//!   UDP endpoint that last sent it, and re-binds on roaming
//! - **Liveness**: a single reserved byte answers outstanding probes or is
//!   echoed back to unknown senders
//! - **Two wire modes**: native message framing, or raw pass-through to an
//!   external reliable-UDP (KCP-style) protocol
//! - **Decoupled I/O**: independent receive and send loops over one socket
//!
//! Delivery, ordering and deduplication are not guaranteed in native mode.
//!
//! ## Feature Flags
//!
//! - `transport` (default): frames, sockets, classification, outbound queue
//! - `server` (default): [`UdpService`], events, in-memory registry
//!
//! ## Modules
//!
//! - [`core`]: Constants, error types and collaborator traits (always included)
//! - [`transport`]: Transport building blocks (requires `transport` feature)
//! - [`server`]: Service API (requires `server` feature)
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framenet::prelude::*;
//!
//! # async fn run() -> Result<(), TransportError> {
//! let registry = Arc::new(SessionTable::new());
//! let player = registry.insert(42);
//!
//! let config = ServiceConfig::new(20000, Mode::Native);
//! let (mut service, mut events) = UdpService::bind(config, registry).await?;
//! service.start();
//!
//! while let Some(event) = events.recv().await {
//!     if let ServiceEvent::Connected { session } = event {
//!         let hello = MessageFrame::encode(1, session.id(), b"welcome")?;
//!         service.send(OutboundMessage::from_frame(&hello, Arc::clone(&player)))?;
//!     }
//! }
//!
//! service.stop().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Service API (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        DatagramSender, DatagramSocket, FrameHeader, Inbound, MessageFrame, Mode,
        OutboundMessage, OutboundQueue,
    };

    #[cfg(feature = "server")]
    pub use crate::server::{
        EventStream, LoopRole, ServiceConfig, ServiceConfigBuilder, ServiceEvent, SessionTable,
        UdpService, UdpSession,
    };
}

// Re-export commonly used items at crate root
pub use crate::core::{Session, SessionKey, SessionRegistry, TransportError, TransportResult};

#[cfg(feature = "transport")]
pub use crate::transport::{MessageFrame, Mode, OutboundMessage};

#[cfg(feature = "server")]
pub use crate::server::{ServiceConfig, ServiceEvent, SessionTable, UdpService, UdpSession};
