//! Transport layer for Ashfire.
//!
//! Provides length-prefixed framing ([`read_frame`], [`write_frame`],
//! [`encode_frame`]) and the [`Connection`] that runs a server session on
//! top of it. Components that only need to talk to the server depend on
//! the [`Outbound`] capability instead of a concrete connection.

mod connection;
mod error;
mod frame;

pub use connection::{Connection, DIAL_TIMEOUT, LossHandler, MessageHandler, with_default_port};
pub use error::TransportError;
pub use frame::{HEADER_LEN, MAX_FRAME_LEN, encode_frame, read_frame, write_frame};

use std::fmt;

use ashfire_protocol::{Message, PacketId};

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The ability to send messages to the server.
///
/// Handed to every component that issues requests (the command
/// correlator, the examine flow, the session stages) so they can be
/// driven by a recording fake in tests.
pub trait Outbound: Send + Sync {
    /// Sends one message.
    fn send(&self, msg: &Message) -> Result<(), TransportError>;

    /// Sends a text command, returning the packet ID it was tagged with.
    fn send_command(&self, text: &str, repeat: u32) -> Result<PacketId, TransportError>;
}
