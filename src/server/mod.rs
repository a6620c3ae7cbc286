//! FrameNet - Service
//!
//! The [`UdpService`] with its receive and send loops, the events it
//! raises, and an in-memory [`SessionTable`] registry.

mod config;
mod event;
mod receiver;
mod sender;
mod service;
mod session;

pub use config::*;
pub use event::{EventStream, LoopRole, ServiceEvent};
pub use service::*;
pub use session::*;
