//! Message dispatch for Ashfire.
//!
//! The [`Registry`] routes every decoded [`Message`](ashfire_protocol::Message)
//! to the callbacks subscribed to its kind, pairing protocol-level
//! rejections ([`Failure`](ashfire_protocol::Failure)) with the request
//! they answer. A [`Scope`] groups the subscriptions of one logical state
//! so they can be removed together.
//!
//! ```text
//! Connection (read task) → Registry::dispatch → callbacks(&mut Ctx, Reply)
//! ```

mod registry;
mod scope;

pub use registry::{Callback, Registry, Reply, SubscriptionId};
pub use scope::Scope;
