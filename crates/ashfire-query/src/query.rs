//! Query records and correlator configuration.

use std::time::{Duration, Instant};

use ashfire_protocol::PacketId;

// ---------------------------------------------------------------------------
// QueryConfig
// ---------------------------------------------------------------------------

/// Configuration for the correlator.
#[derive(Debug, Clone, Default)]
pub struct QueryConfig {
    /// How long a query may wait for its completion before
    /// [`expire_stale`](crate::QueryManager::expire_stale) drops it.
    ///
    /// Default: `None`, queries wait forever.
    pub max_age: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// One correlated command: what was sent, what the server answered so far,
/// and how a follow-up may be built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Packet ID the command was sent with; the completion echoes it.
    pub packet: PacketId,

    /// The command as the user first issued it, without input (`"help"`).
    pub original_command: String,

    /// The text actually sent (`"help spells"`).
    pub command: String,

    /// Lines accumulated from matching text output, each newline-terminated
    /// while pending. The trailing newline is trimmed on completion.
    pub text: String,

    /// Whether the reply should be shown with an input box.
    pub has_input: bool,

    /// Whether submitting input keeps this query's shape, so the answer
    /// offers input again.
    pub repeat: bool,

    /// Label for the submit action, when it isn't the generic one.
    pub submit_label: Option<String>,

    /// `(type, subtype)` of the text output that belongs to this query.
    pub match_type: u8,
    pub match_subtype: u8,

    /// When the command was handed to the connection.
    pub sent_at: Instant,
}

impl Query {
    pub(crate) fn new(
        packet: PacketId,
        command: &str,
        original_command: &str,
        match_type: u8,
        match_subtype: u8,
    ) -> Self {
        Self {
            packet,
            original_command: original_command.to_owned(),
            command: command.to_owned(),
            text: String::new(),
            has_input: false,
            repeat: false,
            submit_label: None,
            match_type,
            match_subtype,
            sent_at: Instant::now(),
        }
    }

    /// Whether a text line of `(msg_type, subtype)` belongs to this query.
    pub fn matches(&self, msg_type: u8, subtype: u8) -> bool {
        self.match_type == msg_type && self.match_subtype == subtype
    }
}
