//! Command correlation for Ashfire.
//!
//! Commands travel as plain text tagged with a packet ID. The server
//! answers with any number of classified text lines and then one
//! completion carrying the packet ID back. [`QueryManager`] stitches the
//! two into a single [`Query`] result.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session (above)   ← routes DrawExtInfo / CommandCompleted here
//!     ↕
//! Query (this crate)
//!     ↕
//! Transport (below) ← Outbound::send_command assigns packet IDs
//! ```

mod error;
mod manager;
mod query;
mod standard;

pub use error::QueryError;
pub use manager::{FallbackCallback, QueryCallback, QueryManager};
pub use query::{Query, QueryConfig};
pub use standard::StandardCommand;
