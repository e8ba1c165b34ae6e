//! The subscription registry.
//!
//! A subscription names the kind of message it wants and, optionally, the
//! kind of request whose rejection it also wants to hear about:
//!
//! ```text
//! on(AccountPlayers, Some(AccountLogin), cb)
//!     AccountPlayers{..}                 → cb(ctx, Reply::Message(..))
//!     Failure{command: AccountLogin, ..} → cb(ctx, Reply::Failure(..))
//! ```
//!
//! Callbacks get mutable access to a caller-chosen context instead of the
//! registry, so a callback can never add or remove subscriptions while a
//! dispatch is walking the list.

use std::fmt;

use ashfire_protocol::{Failure, Message, MessageKind};

/// Handle returned by [`Registry::on`] / [`Registry::once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What a callback is being told: exactly one of success or failure.
#[derive(Debug, Clone, Copy)]
pub enum Reply<'a> {
    /// A message of the subscribed kind.
    Message(&'a Message),
    /// The server rejected the paired request.
    Failure(&'a Failure),
}

impl<'a> Reply<'a> {
    /// The success message, if this is one.
    pub fn message(self) -> Option<&'a Message> {
        match self {
            Reply::Message(msg) => Some(msg),
            Reply::Failure(_) => None,
        }
    }

    /// The failure, if this is one.
    pub fn failure(self) -> Option<&'a Failure> {
        match self {
            Reply::Message(_) => None,
            Reply::Failure(failure) => Some(failure),
        }
    }
}

/// A subscription callback.
pub type Callback<Ctx> = Box<dyn FnMut(&mut Ctx, Reply<'_>) + Send>;

struct Subscription<Ctx> {
    id: SubscriptionId,
    kind: MessageKind,
    failure: Option<MessageKind>,
    once: bool,
    callback: Callback<Ctx>,
}

impl<Ctx> Subscription<Ctx> {
    fn matches<'m>(&self, msg: &'m Message) -> Option<Reply<'m>> {
        if self.kind == msg.kind() {
            return Some(Reply::Message(msg));
        }
        match (msg, self.failure) {
            (Message::Failure(failure), Some(kind)) if failure.command == kind => {
                Some(Reply::Failure(failure))
            }
            _ => None,
        }
    }
}

/// Typed publish/subscribe over decoded messages.
///
/// `Ctx` is whatever state the callbacks mutate; the owner passes it to
/// [`dispatch`](Self::dispatch) alongside each message.
pub struct Registry<Ctx> {
    subscriptions: Vec<Subscription<Ctx>>,
    next_id: u64,
}

impl<Ctx> Default for Registry<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> fmt::Debug for Registry<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("subscriptions", &self.subscriptions.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<Ctx> Registry<Ctx> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 1,
        }
    }

    /// Adds a persistent subscription.
    ///
    /// With `failure = Some(k)`, a [`Failure`] whose `command` is `k` is
    /// delivered to the same callback as [`Reply::Failure`].
    pub fn on<F>(&mut self, kind: MessageKind, failure: Option<MessageKind>, callback: F) -> SubscriptionId
    where
        F: FnMut(&mut Ctx, Reply<'_>) + Send + 'static,
    {
        self.insert(kind, failure, false, Box::new(callback))
    }

    /// Like [`on`](Self::on), but removed right after its first delivery,
    /// success or failure.
    pub fn once<F>(&mut self, kind: MessageKind, failure: Option<MessageKind>, callback: F) -> SubscriptionId
    where
        F: FnMut(&mut Ctx, Reply<'_>) + Send + 'static,
    {
        self.insert(kind, failure, true, Box::new(callback))
    }

    /// Removes a subscription. Returns `false` if it was already gone
    /// (removed earlier, or a once-subscription that has fired).
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        let removed = self.subscriptions.len() != before;
        if removed {
            tracing::trace!(%id, "subscription removed");
        }
        removed
    }

    /// Delivers `msg` to every matching subscription in registration
    /// order. Returns how many callbacks ran.
    ///
    /// A message nobody subscribed to is dropped.
    pub fn dispatch(&mut self, ctx: &mut Ctx, msg: &Message) -> usize {
        let mut invoked = 0;
        let mut i = 0;
        while i < self.subscriptions.len() {
            let sub = &mut self.subscriptions[i];
            if let Some(reply) = sub.matches(msg) {
                (sub.callback)(ctx, reply);
                invoked += 1;
                if sub.once {
                    let sub = self.subscriptions.remove(i);
                    tracing::trace!(id = %sub.id, kind = ?sub.kind, "once-subscription consumed");
                    continue;
                }
            }
            i += 1;
        }
        if invoked == 0 {
            tracing::trace!(kind = ?msg.kind(), "no subscriber, message dropped");
        }
        invoked
    }

    /// Whether a subscription is still registered.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|sub| sub.id == id)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Removes every subscription.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    fn insert(
        &mut self,
        kind: MessageKind,
        failure: Option<MessageKind>,
        once: bool,
        callback: Callback<Ctx>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            kind,
            failure,
            once,
            callback,
        });
        tracing::trace!(%id, ?kind, ?failure, once, "subscription added");
        id
    }
}

// =========================================================================
// Tests
// =========================================================================
