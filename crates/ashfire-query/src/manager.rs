//! The query manager: turns "send a text command" plus "a stream of
//! replies" into one correlated request/response.
//!
//! ```text
//! query_*()  ──→ send_command(text) = K ──→ pending[K]
//!                                              │
//! DrawExtInfo{type, subtype, line} ──first match──→ pending[..].text += line
//!                                              │
//! CommandCompleted{packet: K} ─────────────────→ callback(query), remove K
//! ```
//!
//! # Correlation is first-match
//!
//! Text lines carry no packet ID, only a `(type, subtype)` pair. A line is
//! appended to the FIRST pending query in send order with that pair. Two
//! in-flight queries of the same shape can therefore steal each other's
//! lines; callers that care should not overlap them.

use std::time::Instant;

use ashfire_protocol::{CommandCompleted, DrawExtInfo, PacketId};
use ashfire_transport::Outbound;

use crate::{Query, QueryConfig, QueryError};

/// Called once with the completed query.
pub type QueryCallback = Box<dyn FnOnce(&Query) + Send>;

/// Called for every completed query without its own callback.
pub type FallbackCallback = Box<dyn FnMut(&Query) + Send>;

struct Pending {
    query: Query,
    callback: Option<QueryCallback>,
}

/// Tracks every command that is waiting for its completion message.
pub struct QueryManager {
    /// In send order; text correlation depends on it.
    pending: Vec<Pending>,
    on_complete: Option<FallbackCallback>,
    config: QueryConfig,
}

impl Default for QueryManager {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl QueryManager {
    /// Creates an empty manager.
    pub fn new(config: QueryConfig) -> Self {
        Self {
            pending: Vec::new(),
            on_complete: None,
            config,
        }
    }

    /// Installs the manager-wide completion handler.
    pub fn set_on_complete<F>(&mut self, callback: F)
    where
        F: FnMut(&Query) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
    }

    // ---- Issuing ----------------------------------------------------------

    /// Sends `cmd` and collects text output tagged `(msg_type, subtype)`.
    ///
    /// # Errors
    /// [`QueryError::Send`] if the connection refuses the command; nothing
    /// is recorded in that case.
    pub fn query_simple(
        &mut self,
        out: &dyn Outbound,
        cmd: &str,
        msg_type: u8,
        subtype: u8,
    ) -> Result<PacketId, QueryError> {
        self.issue(out, cmd, cmd, msg_type, subtype, None)
            .map(|q| q.packet)
    }

    /// Like [`query_simple`](Self::query_simple), but the reply accepts
    /// input. Returns the recorded query so the caller can mark it
    /// repeatable or label its submit action.
    pub fn query_simple_with_input(
        &mut self,
        out: &dyn Outbound,
        cmd: &str,
        msg_type: u8,
        subtype: u8,
    ) -> Result<&mut Query, QueryError> {
        let query = self.issue(out, cmd, cmd, msg_type, subtype, None)?;
        query.has_input = true;
        Ok(query)
    }

    /// Sends `cmd`, remembering `original` as the command it was built
    /// from, and optionally a callback that takes precedence over the
    /// manager-wide handler.
    pub fn query_complex(
        &mut self,
        out: &dyn Outbound,
        cmd: &str,
        original: &str,
        msg_type: u8,
        subtype: u8,
        callback: Option<QueryCallback>,
    ) -> Result<PacketId, QueryError> {
        self.issue(out, cmd, original, msg_type, subtype, callback)
            .map(|q| q.packet)
    }

    /// Sends a new query shaped like `template`: same command text,
    /// correlation pair, and input settings, with a fresh packet ID and
    /// empty text.
    pub fn query(&mut self, out: &dyn Outbound, template: &Query) -> Result<PacketId, QueryError> {
        let query = self.issue(
            out,
            &template.command,
            &template.original_command,
            template.match_type,
            template.match_subtype,
            None,
        )?;
        query.has_input = template.has_input;
        query.repeat = template.repeat;
        query.submit_label = template.submit_label.clone();
        Ok(query.packet)
    }

    /// Answers a completed query with user input.
    ///
    /// The new command is `original_command + " " + input`, with `input`
    /// passed through as given. A repeatable query keeps its shape (so its
    /// answer accepts input again); any other becomes a plain complex
    /// query.
    ///
    /// # Errors
    /// [`QueryError::InputNotAccepted`] if `completed` never took input,
    /// [`QueryError::EmptyInput`] for an empty string.
    pub fn resubmit(
        &mut self,
        out: &dyn Outbound,
        completed: &Query,
        input: &str,
    ) -> Result<PacketId, QueryError> {
        if !completed.has_input {
            return Err(QueryError::InputNotAccepted(completed.packet));
        }
        if input.is_empty() {
            return Err(QueryError::EmptyInput(completed.packet));
        }

        let command = format!("{} {}", completed.original_command, input);
        if completed.repeat {
            let template = Query {
                command,
                ..completed.clone()
            };
            self.query(out, &template)
        } else {
            self.query_complex(
                out,
                &command,
                &completed.original_command,
                completed.match_type,
                completed.match_subtype,
                None,
            )
        }
    }

    fn issue(
        &mut self,
        out: &dyn Outbound,
        cmd: &str,
        original: &str,
        msg_type: u8,
        subtype: u8,
        callback: Option<QueryCallback>,
    ) -> Result<&mut Query, QueryError> {
        let packet = out.send_command(cmd, 0)?;
        tracing::debug!(%packet, command = cmd, msg_type, subtype, "query pending");
        self.pending.push(Pending {
            query: Query::new(packet, cmd, original, msg_type, subtype),
            callback,
        });
        let index = self.pending.len() - 1;
        Ok(&mut self.pending[index].query)
    }

    // ---- Replies ----------------------------------------------------------

    /// Offers a text line to the pending queries. The first one whose
    /// `(type, subtype)` matches gets `line + "\n"`.
    ///
    /// Returns `true` if a query took the line.
    pub fn check_text(&mut self, info: &DrawExtInfo) -> bool {
        let Some(pending) = self
            .pending
            .iter_mut()
            .find(|p| p.query.matches(info.msg_type, info.subtype))
        else {
            return false;
        };
        pending.query.text.push_str(&info.message);
        pending.query.text.push('\n');
        true
    }

    /// Completes the query with the echoed packet ID.
    ///
    /// The trailing newline is trimmed, then the query's own callback runs
    /// if it has one, otherwise the manager-wide handler. The query is
    /// removed and returned. Unknown packet IDs are ignored.
    pub fn check_completed(&mut self, done: &CommandCompleted) -> Option<Query> {
        let Some(index) = self.pending.iter().position(|p| p.query.packet == done.packet) else {
            tracing::trace!(packet = %done.packet, "completion for unknown packet ignored");
            return None;
        };
        let Pending {
            mut query,
            callback,
        } = self.pending.remove(index);

        if query.text.ends_with('\n') {
            query.text.pop();
        }
        tracing::debug!(
            packet = %query.packet,
            command = %query.command,
            lines = query.text.lines().count(),
            "query completed"
        );

        match callback {
            Some(callback) => callback(&query),
            None => {
                if let Some(fallback) = self.on_complete.as_mut() {
                    fallback(&query);
                }
            }
        }
        Some(query)
    }

    // ---- Housekeeping -----------------------------------------------------

    /// Drops queries older than `config.max_age`, returning their IDs.
    /// Does nothing when no maximum age is configured.
    pub fn expire_stale(&mut self) -> Vec<PacketId> {
        let Some(max_age) = self.config.max_age else {
            return Vec::new();
        };
        let now = Instant::now();
        let mut expired = Vec::new();
        self.pending.retain(|p| {
            let stale = now.saturating_duration_since(p.query.sent_at) > max_age;
            if stale {
                expired.push(p.query.packet);
                tracing::warn!(packet = %p.query.packet, command = %p.query.command, "query expired without completion");
            }
            !stale
        });
        expired
    }

    /// Forgets every pending query without running callbacks.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Looks up a pending query.
    pub fn get(&self, packet: PacketId) -> Option<&Query> {
        self.pending
            .iter()
            .map(|p| &p.query)
            .find(|q| q.packet == packet)
    }

    /// Whether `packet` is still waiting for completion.
    pub fn is_pending(&self, packet: PacketId) -> bool {
        self.get(packet).is_some()
    }

    /// Pending queries in send order.
    pub fn pending(&self) -> impl Iterator<Item = &Query> {
        self.pending.iter().map(|p| &p.query)
    }

    /// Number of pending queries.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
