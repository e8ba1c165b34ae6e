//! Identifier types and numeric constants shared by every layer.
//!
//! The server identifies everything with small integers: objects and
//! inventories by tag, images by face number, animations by anim number,
//! and command round-trips by packet number. Each gets its own newtype so
//! a face can never be passed where a tag is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A server-assigned identifier for a game object.
///
/// Tags key both the object table and the inventories: tag `0` is the
/// ground, the player's own tag is what they carry, and any other tag is
/// the contents of that container.
///
/// `#[serde(transparent)]` serializes `Tag(5)` as plain `5`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tag(pub u32);

impl Tag {
    /// The ground "container" at the player's feet.
    pub const GROUND: Tag = Tag(0);

    /// Returns `true` for the ground pseudo-container.
    pub fn is_ground(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A server-defined image identifier.
///
/// Face `0` means "nothing here"; map updates use it to clear a cell.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FaceId(pub u32);

impl FaceId {
    /// The blank face.
    pub const BLANK: FaceId = FaceId(0);

    /// Returns `true` for the blank face.
    pub fn is_blank(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "face-{}", self.0)
    }
}

/// A server-defined animation identifier (an ordered list of faces).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AnimId(pub u16);

impl fmt::Display for AnimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim-{}", self.0)
    }
}

/// A client-assigned command sequence number.
///
/// Real packet numbers start at 1 and only grow; `0` is the
/// non-correlating sentinel the server uses for unsolicited completions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PacketId(pub u32);

impl PacketId {
    /// The sentinel that never correlates with a pending command.
    pub const NONE: PacketId = PacketId(0);

    /// Returns `true` for the sentinel.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkt-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Text-output classification
// ---------------------------------------------------------------------------

/// Top-level classification of a text-output line (`DrawExtInfo::msg_type`).
pub mod msg_type {
    pub const BOOK: u8 = 1;
    pub const CARD: u8 = 2;
    pub const PAPER: u8 = 3;
    pub const SIGN: u8 = 4;
    pub const MONUMENT: u8 = 5;
    pub const DIALOG: u8 = 6;
    pub const MOTD: u8 = 7;
    pub const ADMIN: u8 = 8;
    pub const SHOP: u8 = 9;
    pub const COMMAND: u8 = 10;
    pub const ATTRIBUTE: u8 = 11;
    pub const SKILL: u8 = 12;
    pub const APPLY: u8 = 13;
    pub const ATTACK: u8 = 14;
    pub const COMMUNICATION: u8 = 15;
    pub const SPELL: u8 = 16;
    pub const ITEM: u8 = 17;
    pub const MISC: u8 = 18;
    pub const VICTIM: u8 = 19;
    pub const CLIENT: u8 = 20;
}

/// Second-level classification (`DrawExtInfo::subtype`). The meaning of a
/// subtype depends on its type, so the constants carry the type as a prefix.
pub mod msg_subtype {
    pub const ADMIN_RULES: u8 = 1;
    pub const ADMIN_NEWS: u8 = 2;
    pub const ADMIN_PLAYER: u8 = 3;
    pub const ADMIN_DM: u8 = 4;
    pub const ADMIN_HISCORE: u8 = 5;

    pub const COMMAND_WHO: u8 = 1;
    pub const COMMAND_MAPS: u8 = 2;
    pub const COMMAND_BODY: u8 = 3;
    pub const COMMAND_MALLOC: u8 = 4;
    pub const COMMAND_WEATHER: u8 = 5;
    pub const COMMAND_STATISTICS: u8 = 6;
    pub const COMMAND_CONFIG: u8 = 7;
    pub const COMMAND_INFO: u8 = 8;
    pub const COMMAND_QUESTS: u8 = 9;
    pub const COMMAND_DEBUG: u8 = 10;
    pub const COMMAND_ERROR: u8 = 11;
    pub const COMMAND_SUCCESS: u8 = 12;
    pub const COMMAND_FAILURE: u8 = 13;
    pub const COMMAND_EXAMINE: u8 = 14;
    pub const COMMAND_INVENTORY: u8 = 15;

    pub const SKILL_LIST: u8 = 6;

    pub const SPELL_INFO: u8 = 9;
}

/// Bits of `Map2Data::Anim::flags` / `Anim::flags`.
pub mod anim_flags {
    /// Pick a uniformly random frame each time the animation advances.
    pub const RANDOM: u8 = 1;
    /// Keep frames in step across every tile showing the animation.
    pub const SYNC: u8 = 2;
}

/// Default TCP port of a game server.
pub const DEFAULT_PORT: u16 = 13327;

/// Protocol version this client implements, exchanged during the handshake.
pub const PROTOCOL_VERSION: &str = "1030";

// ---------------------------------------------------------------------------
// Item types
// ---------------------------------------------------------------------------

/// Returns `true` when an item type denotes something that holds other
/// items (bags, chests, quivers...). The server reserves types 50..100.
pub fn is_container_kind(kind: u16) -> bool {
    (50..100).contains(&kind)
}
