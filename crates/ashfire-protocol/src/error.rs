//! Error types for the protocol layer.
//!
//! Each crate in Ashfire defines its own error enum. A `ProtocolError`
//! always means the bytes and the typed messages disagreed: the problem
//! is in encoding or decoding, not in the socket or the world models.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a [`Message`](crate::Message) into
    /// bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a frame payload into a message).
    ///
    /// Common causes: a truncated payload, an unknown message type, or a
    /// field with the wrong shape. The connection treats this as fatal.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates a protocol rule, e.g. a map size
    /// that isn't of the form `WxH`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
