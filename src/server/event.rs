//! Service events and the loop error policy.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::core::{Session, TransportError, TransportResult};
use crate::transport::MessageFrame;

/// Which background loop raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopRole {
    /// Datagram receive and dispatch loop.
    Receive,
    /// Outbound drain / pass-through tick loop.
    Send,
}

impl fmt::Display for LoopRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopRole::Receive => f.write_str("receive"),
            LoopRole::Send => f.write_str("send"),
        }
    }
}

/// Event from the service.
pub enum ServiceEvent<S> {
    /// A session's peer endpoint was bound or changed by a handshake.
    Connected {
        /// The session now reachable at its new endpoint.
        session: Arc<S>,
    },

    /// A valid frame arrived for a known session (native mode only).
    Received {
        /// The frame.
        frame: MessageFrame,
        /// Session the frame was routed to.
        session: Arc<S>,
    },

    /// A loop hit an unexpected error and terminated.
    ///
    /// The service stays inactive until it is stopped.
    Fatal {
        /// Loop that terminated.
        role: LoopRole,
        /// The error.
        error: TransportError,
    },
}

impl<S: Session> fmt::Debug for ServiceEvent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceEvent::Connected { session } => f
                .debug_struct("Connected")
                .field("session", &session.id())
                .finish(),
            ServiceEvent::Received { frame, session } => f
                .debug_struct("Received")
                .field("frame", frame)
                .field("session", &session.id())
                .finish(),
            ServiceEvent::Fatal { role, error } => f
                .debug_struct("Fatal")
                .field("role", role)
                .field("error", error)
                .finish(),
        }
    }
}

/// Receiving end of the service's events.
pub type EventStream<S> = mpsc::Receiver<ServiceEvent<S>>;

/// Apply the loop error policy to one step's result.
///
/// Transient errors are logged at debug level and absorbed, silent drops
/// are absorbed without a log, and anything else is logged as an error and
/// handed back so the owning loop terminates.
pub(crate) fn absorb(role: LoopRole, result: TransportResult<()>) -> TransportResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_transient() => {
            debug!(role = %role, error = %e, "transient socket error");
            Ok(())
        }
        Err(e) if e.is_silent_drop() => Ok(()),
        Err(e) => {
            error!(role = %role, error = %e, "unexpected error, terminating loop");
            Err(e)
        }
    }
}
