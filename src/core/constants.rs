//! Wire and timing constants shared by the transport and the service.
//!
//! The byte-level values are part of the wire contract with clients and
//! MUST NOT be changed without updating every peer.

use std::time::Duration;

// =============================================================================
// DATAGRAM SHAPES
// =============================================================================

/// Reserved single-byte liveness probe.
///
/// A datagram consisting of exactly this one byte is a ping, never payload.
pub const PING_BYTE: u8 = 0xFF;

/// Length of a native handshake datagram (little-endian `i32` session id).
pub const HANDSHAKE_SIZE: usize = 4;

/// Header size of the reliable-UDP (KCP-style) protocol.
pub const PASS_THROUGH_HEADER_SIZE: usize = 24;

/// Length of a pass-through handshake datagram (header plus a 4-byte body).
///
/// The session id is read from the first four bytes, which the
/// pass-through protocol uses as its conversation id.
pub const PASS_THROUGH_HANDSHAKE_SIZE: usize = PASS_THROUGH_HEADER_SIZE + HANDSHAKE_SIZE;

// =============================================================================
// MESSAGE FRAME
// =============================================================================

/// Message frame header size (msg_id + extra + body_len, all LE32).
pub const FRAME_HEADER_SIZE: usize = 12;

// =============================================================================
// SOCKET / LOOP DEFAULTS
// =============================================================================

/// Default receive buffer size (largest UDP payload).
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

/// Default interval between pass-through maintenance ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest accepted tick interval; smaller values are raised to this.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Pass-through datagrams a session holds before new arrivals are dropped.
pub const MAX_PASS_THROUGH_BACKLOG: usize = 1024;

/// Default capacity of the service event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default port the service binds to.
pub const DEFAULT_PORT: u16 = 20000;
