//! Error types for the command correlator.

use ashfire_protocol::PacketId;
use ashfire_transport::TransportError;

/// Errors that can occur while issuing or resubmitting a query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The command couldn't be handed to the connection.
    #[error(transparent)]
    Send(#[from] TransportError),

    /// A completed query that doesn't take input was resubmitted with input.
    #[error("query {0} does not accept input")]
    InputNotAccepted(PacketId),

    /// Resubmission with an empty input string.
    #[error("no input given for query {0}")]
    EmptyInput(PacketId),
}
