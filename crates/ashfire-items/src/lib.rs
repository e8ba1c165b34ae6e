//! # ashfire-items
//!
//! The object table keyed by server tag, the inventories listing those
//! objects (ground, player, containers), and examine text collection.
//!
//! [`ItemStore`] is mutated only from the dispatch path and needs no
//! locking of its own.

pub mod error;
pub mod examine;
pub mod object;
pub mod store;

pub use error::ItemError;
pub use examine::{ExamineOutcome, is_examine_text};
pub use object::{GameObject, Inventory};
pub use store::{ItemEvent, ItemObserver, ItemStore, PlayerChange};
