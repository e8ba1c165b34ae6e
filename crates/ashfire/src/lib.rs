//! # Ashfire
//!
//! Client core for a stateful, length-prefixed game protocol.
//!
//! Ashfire keeps a live picture of the game (faces, a multi-layer
//! scrolling board, objects and inventories, spells and skills, pending
//! commands) in sync with the server. A presentation layer reads that
//! picture and issues actions; it never touches the wire.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ashfire::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let mut config = ClientConfig::default();
//! config.apply_env();
//!
//! let client = Client::join(config, JsonCodec).await?;
//! let stage = client.wait_for(Stage::is_playing, Duration::from_secs(10)).await;
//! if stage.is_playing() {
//!     client.send_command("who")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod metaserver;
pub mod session;
pub mod stage;
pub mod world;

pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use metaserver::{MetaserverError, ServerEntry, fetch_servers};
pub use session::Session;
pub use stage::Stage;
pub use world::World;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"info"` or `"ashfire=debug"`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub mod prelude {
    //! Everything needed to drive a client.

    pub use crate::{
        Client, ClientConfig, ClientError, ServerEntry, Session, Stage, World, fetch_servers,
        init_tracing,
    };
    pub use ashfire_board::{BoardEvent, FaceCache, MultiBoard, Placement};
    pub use ashfire_items::{GameObject, Inventory, ItemEvent};
    pub use ashfire_protocol::{
        Codec, FaceId, JsonCodec, Message, MessageKind, PacketId, Tag, msg_subtype, msg_type,
    };
    pub use ashfire_query::{Query, StandardCommand};
    pub use ashfire_skills::{KnownSkill, SkillSort};
    pub use ashfire_tick::TickConfig;
}
