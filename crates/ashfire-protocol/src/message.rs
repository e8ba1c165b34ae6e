//! The typed messages exchanged with the game server.
//!
//! Every frame payload decodes to exactly one [`Message`]. Messages are
//! grouped the way a session uses them:
//!
//! - **Handshake / account**: [`Version`], [`Setup`], [`AccountLogin`],
//!   [`AccountPlayers`], [`AccountPlay`], [`Failure`]
//! - **Assets**: [`RequestInfo`], [`ReplyInfo`], [`Face2`], [`AskFace`],
//!   [`Image2`], [`Anim`]
//! - **Map**: [`Map2`], `NewMap`, [`Tick`]
//! - **Objects**: [`Player`], [`Item2`], [`UpdateItem`], [`DeleteItem`],
//!   [`DeleteInventory`], [`Examine`], [`Apply`], [`MoveItem`]
//! - **Commands / text**: [`NewCommand`], [`CommandCompleted`],
//!   [`DrawExtInfo`]
//! - **Character**: [`Stats`], [`AddSpell`], [`UpdateSpell`], [`DeleteSpell`]
//!
//! [`MessageKind`] is the payload-free discriminant used to subscribe to a
//! kind of message without holding an instance of it.

use serde::{Deserialize, Serialize};

use crate::{AnimId, FaceId, PacketId, ProtocolError, Tag};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One decoded frame.
///
/// `#[serde(tag = "type")]` gives the JSON form `{"type": "Tick", "tick": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    Version(Version),
    Setup(Setup),
    AccountLogin(AccountLogin),
    AccountPlayers(AccountPlayers),
    AccountPlay(AccountPlay),
    /// A protocol-level rejection of an earlier request.
    Failure(Failure),
    RequestInfo(RequestInfo),
    ReplyInfo(ReplyInfo),
    Face2(Face2),
    AskFace(AskFace),
    Image2(Image2),
    Anim(Anim),
    Map2(Map2),
    /// The player changed maps; every cell of the board is stale.
    NewMap,
    Tick(Tick),
    Player(Player),
    Item2(Item2),
    UpdateItem(UpdateItem),
    DeleteItem(DeleteItem),
    DeleteInventory(DeleteInventory),
    DrawExtInfo(DrawExtInfo),
    NewCommand(NewCommand),
    CommandCompleted(CommandCompleted),
    Examine(Examine),
    Apply(Apply),
    Move(MoveItem),
    Stats(Stats),
    AddSpell(AddSpell),
    UpdateSpell(UpdateSpell),
    DeleteSpell(DeleteSpell),
}

/// Payload-free discriminant of [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Version,
    Setup,
    AccountLogin,
    AccountPlayers,
    AccountPlay,
    Failure,
    RequestInfo,
    ReplyInfo,
    Face2,
    AskFace,
    Image2,
    Anim,
    Map2,
    NewMap,
    Tick,
    Player,
    Item2,
    UpdateItem,
    DeleteItem,
    DeleteInventory,
    DrawExtInfo,
    NewCommand,
    CommandCompleted,
    Examine,
    Apply,
    Move,
    Stats,
    AddSpell,
    UpdateSpell,
    DeleteSpell,
}

impl Message {
    /// The concrete kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Version(_) => MessageKind::Version,
            Message::Setup(_) => MessageKind::Setup,
            Message::AccountLogin(_) => MessageKind::AccountLogin,
            Message::AccountPlayers(_) => MessageKind::AccountPlayers,
            Message::AccountPlay(_) => MessageKind::AccountPlay,
            Message::Failure(_) => MessageKind::Failure,
            Message::RequestInfo(_) => MessageKind::RequestInfo,
            Message::ReplyInfo(_) => MessageKind::ReplyInfo,
            Message::Face2(_) => MessageKind::Face2,
            Message::AskFace(_) => MessageKind::AskFace,
            Message::Image2(_) => MessageKind::Image2,
            Message::Anim(_) => MessageKind::Anim,
            Message::Map2(_) => MessageKind::Map2,
            Message::NewMap => MessageKind::NewMap,
            Message::Tick(_) => MessageKind::Tick,
            Message::Player(_) => MessageKind::Player,
            Message::Item2(_) => MessageKind::Item2,
            Message::UpdateItem(_) => MessageKind::UpdateItem,
            Message::DeleteItem(_) => MessageKind::DeleteItem,
            Message::DeleteInventory(_) => MessageKind::DeleteInventory,
            Message::DrawExtInfo(_) => MessageKind::DrawExtInfo,
            Message::NewCommand(_) => MessageKind::NewCommand,
            Message::CommandCompleted(_) => MessageKind::CommandCompleted,
            Message::Examine(_) => MessageKind::Examine,
            Message::Apply(_) => MessageKind::Apply,
            Message::Move(_) => MessageKind::Move,
            Message::Stats(_) => MessageKind::Stats,
            Message::AddSpell(_) => MessageKind::AddSpell,
            Message::UpdateSpell(_) => MessageKind::UpdateSpell,
            Message::DeleteSpell(_) => MessageKind::DeleteSpell,
        }
    }
}

// ---------------------------------------------------------------------------
// Handshake and account
// ---------------------------------------------------------------------------

/// Version exchange. The server speaks first; the client answers with its
/// own version and name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub cl_version: String,
    #[serde(default)]
    pub sv_version: String,
    #[serde(default)]
    pub sv_name: String,
}

/// Negotiation of optional protocol features.
///
/// Only the fields that are `Some` are being negotiated. The server
/// acknowledges with a `Setup` carrying the values it accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Setup {
    /// Viewport in cells, formatted `"WxH"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_stats: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_set: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<u8>,
}

impl Setup {
    /// Parses `map_size` into `(width, height)` cells.
    ///
    /// Returns `Ok(None)` when the field is absent.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] when the value is present
    /// but not of the form `WxH`.
    pub fn map_dimensions(&self) -> Result<Option<(usize, usize)>, ProtocolError> {
        self.map_size.as_deref().map(parse_map_size).transpose()
    }
}

/// Parses a map size of the form `"11x11"` into `(width, height)`.
///
/// # Errors
/// Returns [`ProtocolError::InvalidMessage`] for anything else.
pub fn parse_map_size(value: &str) -> Result<(usize, usize), ProtocolError> {
    let invalid = || ProtocolError::InvalidMessage(format!("bad map size {value:?}"));
    let (w, h) = value.trim().split_once('x').ok_or_else(invalid)?;
    let w = w.parse::<usize>().map_err(|_| invalid())?;
    let h = h.parse::<usize>().map_err(|_| invalid())?;
    Ok((w, h))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLogin {
    pub account: String,
    pub password: String,
}

/// One playable character on an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub name: String,
    pub class: String,
    pub race: String,
    pub level: u16,
    pub face: FaceId,
    pub map: String,
}

/// Sent by the server after a successful login, and again whenever the
/// player leaves the game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPlayers {
    pub characters: Vec<Character>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPlay {
    pub character: String,
}

/// The server refused a request. `command` names the kind of the request
/// that failed, so a subscriber waiting on that request can be told "no".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub command: MessageKind,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Information topics the client can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfoTopic {
    ImageInfo,
    /// Names and icons of every skill.
    SkillInfo,
    /// Skill descriptions.
    SkillExtra,
    /// Experience needed per level.
    ExpTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub topic: InfoTopic,
}

/// One image set offered by the server (e.g. 32x32 or 64x64 tiles).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceSetInfo {
    pub index: u8,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// One skill as described by the skill topics. `skill_info` fills the
/// name and face, `skill_extra` the description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillInfo {
    pub skill: u16,
    pub name: String,
    pub face: FaceId,
    pub description: String,
}

/// The answer to a [`RequestInfo`]. Only the fields of `topic` are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyInfo {
    pub topic: InfoTopic,
    #[serde(default)]
    pub image_sets: Vec<FaceSetInfo>,
    #[serde(default)]
    pub skills: Vec<SkillInfo>,
    /// Total experience needed for each level; entry `n` is what reaching
    /// level `n + 1` takes.
    #[serde(default)]
    pub exp_table: Vec<u64>,
}

impl ReplyInfo {
    /// An empty reply for `topic`.
    pub fn new(topic: InfoTopic) -> Self {
        Self {
            topic,
            image_sets: Vec::new(),
            skills: Vec::new(),
            exp_table: Vec::new(),
        }
    }
}

/// Announces a face: its number and name. The image itself must be asked
/// for separately with [`AskFace`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face2 {
    pub face: FaceId,
    #[serde(default)]
    pub set: u8,
    #[serde(default)]
    pub checksum: u32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskFace {
    pub face: FaceId,
}

/// The image bytes of a face. Opaque to the core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image2 {
    pub face: FaceId,
    #[serde(default)]
    pub set: u8,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// Defines an animation as an ordered list of faces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anim {
    pub anim: AnimId,
    #[serde(default)]
    pub flags: u16,
    pub faces: Vec<FaceId>,
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// A batch of map deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map2 {
    pub coords: Vec<Map2Coord>,
}

/// Whether a coordinate addresses a cell or scrolls the whole view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordKind {
    #[default]
    Normal,
    /// `x`/`y` are the scroll offsets.
    Scroll,
}

/// Deltas for one cell, or one scroll instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map2Coord {
    pub x: i16,
    pub y: i16,
    #[serde(default)]
    pub kind: CoordKind,
    #[serde(default)]
    pub data: Vec<Map2Data>,
}

/// A single change to one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Map2Data {
    /// Every layer of the cell becomes empty.
    Clear,
    ClearLayer { layer: u8 },
    Darkness { value: u8 },
    /// Face `0` empties the layer.
    Image { layer: u8, face: FaceId },
    Anim { layer: u8, anim: AnimId, flags: u8, speed: u8 },
}

/// Server-paced animation clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub tick: u32,
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Identifies the player object. An empty `name` means the player left
/// the game and is back at character selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub tag: Tag,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub face: FaceId,
    #[serde(default)]
    pub name: String,
}

/// Full description of one object inside an [`Item2`] payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemObject {
    pub tag: Tag,
    pub flags: u32,
    pub weight: i32,
    pub face: FaceId,
    pub name: String,
    pub plural: String,
    pub anim: AnimId,
    pub anim_speed: u8,
    pub nrof: u32,
    /// Item type. Containers use 50..100.
    pub kind: u16,
}

/// A set of objects that all live in `location`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item2 {
    pub location: Tag,
    pub objects: Vec<ItemObject>,
}

/// One independently applied field of an [`UpdateItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemField {
    Location(Tag),
    Flags(u32),
    Weight(i32),
    Face(FaceId),
    Name { name: String, plural: String },
    Anim(AnimId),
    AnimSpeed(u8),
    Nrof(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub tag: Tag,
    pub fields: Vec<ItemField>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteItem {
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteInventory {
    pub tag: Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Examine {
    pub tag: Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apply {
    pub tag: Tag,
}

/// Moves `nrof` of `tag` into `to` (`0` = drop to the ground, `0` count =
/// the whole stack).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveItem {
    pub to: Tag,
    pub tag: Tag,
    pub nrof: u32,
}

// ---------------------------------------------------------------------------
// Commands and text
// ---------------------------------------------------------------------------

/// A tagged line of free text from the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawExtInfo {
    #[serde(default)]
    pub color: u8,
    pub msg_type: u8,
    pub subtype: u8,
    pub message: String,
}

/// A plain-text command wrapped with its packet number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommand {
    pub packet: PacketId,
    /// How many times the server should repeat the command (0 = once).
    pub repeat: u32,
    pub command: String,
}

/// Marks the end of the server's reply to a [`NewCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCompleted {
    pub packet: PacketId,
    #[serde(default)]
    pub time: u32,
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// One entry of a [`Stats`] message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stat")]
pub enum Stat {
    /// Level and experience of one skill the player knows.
    Skill { skill: u16, level: u8, exp: u64 },
    /// Overall experience.
    Exp { value: u64 },
    /// Overall level.
    Level { value: u16 },
    /// Any stat the client doesn't track.
    #[serde(other)]
    Other,
}

/// A batch of changed character stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub stats: Vec<Stat>,
}

/// A spell the player knows, keyed by its tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spell {
    pub tag: Tag,
    pub level: u16,
    pub casting_time: u16,
    pub mana: i16,
    pub grace: i16,
    pub damage: i16,
    /// The skill (school) used to cast it.
    pub skill: u8,
    pub path: u32,
    pub face: FaceId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSpell {
    pub spells: Vec<Spell>,
}

/// One independently applied field of an [`UpdateSpell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellField {
    Mana(i16),
    Grace(i16),
    Damage(i16),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSpell {
    pub tag: Tag,
    pub fields: Vec<SpellField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSpell {
    pub tag: Tag,
}
