//! Wire protocol for Ashfire.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Identifiers** ([`Tag`], [`FaceId`], [`AnimId`], [`PacketId`]) and the
//!   numeric text-classification constants ([`msg_type`], [`msg_subtype`]).
//! - **Messages** ([`Message`], [`MessageKind`] and one struct per payload).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) for turning messages into
//!   frame payloads and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (length-prefixed frames) and
//! the client models. It knows nothing about sockets or world state.
//!
//! ```text
//! Transport (frames) → Protocol (Message) → Dispatch → Query / Board / Items
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod message;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{
    AccountLogin, AccountPlay, AccountPlayers, AddSpell, Anim, Apply, AskFace, Character,
    CommandCompleted, CoordKind, DeleteInventory, DeleteItem, DeleteSpell, DrawExtInfo,
    Examine, Face2, FaceSetInfo, Failure, Image2, InfoTopic, Item2, ItemField, ItemObject,
    Map2, Map2Coord, Map2Data, Message, MessageKind, MoveItem, NewCommand, Player,
    ReplyInfo, RequestInfo, Setup, SkillInfo, Spell, SpellField, Stat, Stats, Tick,
    UpdateItem, UpdateSpell, Version, parse_map_size,
};
pub use types::{
    AnimId, DEFAULT_PORT, FaceId, PROTOCOL_VERSION, PacketId, Tag, anim_flags,
    is_container_kind, msg_subtype, msg_type,
};
