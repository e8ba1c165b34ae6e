//! Subscriptions owned by one logical state.
//!
//! A session stage (handshake, login, play...) registers everything it
//! listens to through its [`Scope`], then leaves by tearing the scope
//! down. Nothing the stage registered survives it.

use ashfire_protocol::MessageKind;

use crate::{Registry, Reply, SubscriptionId};

/// The set of subscriptions one owner is responsible for.
#[derive(Debug, Default)]
pub struct Scope {
    name: &'static str,
    ids: Vec<SubscriptionId>,
}

impl Scope {
    /// Creates an empty scope. `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ids: Vec::new(),
        }
    }

    /// The name given at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// [`Registry::on`], owned by this scope.
    pub fn on<Ctx, F>(
        &mut self,
        registry: &mut Registry<Ctx>,
        kind: MessageKind,
        failure: Option<MessageKind>,
        callback: F,
    ) -> SubscriptionId
    where
        F: FnMut(&mut Ctx, Reply<'_>) + Send + 'static,
    {
        let id = registry.on(kind, failure, callback);
        self.ids.push(id);
        id
    }

    /// [`Registry::once`], owned by this scope.
    pub fn once<Ctx, F>(
        &mut self,
        registry: &mut Registry<Ctx>,
        kind: MessageKind,
        failure: Option<MessageKind>,
        callback: F,
    ) -> SubscriptionId
    where
        F: FnMut(&mut Ctx, Reply<'_>) + Send + 'static,
    {
        let id = registry.once(kind, failure, callback);
        self.ids.push(id);
        id
    }

    /// Number of subscriptions this scope has registered and not yet left.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Removes every subscription this scope registered. Once-subscriptions
    /// that already fired are skipped. Returns how many were removed.
    pub fn leave<Ctx>(&mut self, registry: &mut Registry<Ctx>) -> usize {
        let removed = self.ids.drain(..).filter(|id| registry.off(*id)).count();
        tracing::debug!(scope = self.name, removed, "scope left");
        removed
    }
}
