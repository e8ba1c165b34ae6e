use ashfire_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
///
/// Everything except [`EmptyMessage`](Self::EmptyMessage) and
/// [`FrameTooLarge`](Self::FrameTooLarge) on the send path is fatal to the
/// connection: it closes and the loss handler receives the error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Dialing the server failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server didn't accept the connection within the dial timeout.
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    /// The connection was closed (explicitly or after a loss).
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading a frame failed, including a short read at end of stream.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The message handler panicked while handling a message.
    #[error("handler panicked on {kind}: {reason}")]
    HandlerPanicked { kind: String, reason: String },

    /// A payload couldn't be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The codec produced zero bytes for a message.
    #[error("refusing to send an empty message")]
    EmptyMessage,

    /// The payload doesn't fit a 2-byte length prefix.
    #[error("frame of {0} bytes exceeds the 65535 byte limit")]
    FrameTooLarge(usize),
}
