//! Unified error type for the Ashfire client.

use ashfire_board::BoardError;
use ashfire_items::ItemError;
use ashfire_protocol::ProtocolError;
use ashfire_query::QueryError;
use ashfire_transport::TransportError;

use crate::config::ConfigError;
use crate::metaserver::MetaserverError;

/// Top-level error that wraps all crate-specific errors.
///
/// Callers of the `ashfire` crate deal with this single type instead of
/// importing errors from each sub-crate. The `#[from]` attribute on each
/// variant lets `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A transport-level error (dial, send, connection loss).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A correlated command could not be issued or resubmitted.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A board mutation was rejected.
    #[error(transparent)]
    Board(#[from] BoardError),

    /// An object operation named an unknown object.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A metaserver could not be asked for the server list.
    #[error(transparent)]
    Metaserver(#[from] MetaserverError),

    /// The operation is not available in the current session stage.
    #[error("{action} is not possible while {stage}")]
    WrongStage {
        action: &'static str,
        stage: String,
    },
}
