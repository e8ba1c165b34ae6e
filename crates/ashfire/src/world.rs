//! The client-side picture of the game, as built from server messages.
//!
//! [`World`] is the context every subscription callback runs against. It
//! owns the models (faces, board, objects, spells and skills, pending
//! commands) plus the
//! bits of session bookkeeping the stages share, and the outbound side of
//! the connection so callbacks can answer the server.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use ashfire_board::{BoardManager, FaceStore};
use ashfire_items::{ExamineOutcome, ItemStore};
use ashfire_protocol::{
    Anim, Apply, AskFace, Character, CommandCompleted, DrawExtInfo, Face2, Image2, Message,
    MoveItem, PacketId, Tag,
};
use ashfire_query::{Query, QueryManager, StandardCommand};
use ashfire_skills::{SkillStore, SpellStore};
use ashfire_transport::{Outbound, TransportError};

use crate::ClientError;
use crate::config::ClientConfig;
use crate::stage::Stage;

/// Login details and presentation settings the stages read.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) client_name: String,
    pub(crate) account: String,
    pub(crate) password: String,
    pub(crate) face_set: Option<u8>,
    pub(crate) viewport: (u32, u32),
}

/// Faces, board, objects and commands of one session.
pub struct World {
    out: Arc<dyn Outbound>,
    pub(crate) settings: Settings,
    pub(crate) auto_character: Option<String>,

    pub(crate) faces: FaceStore,
    pub(crate) board: BoardManager,
    pub(crate) items: ItemStore,
    pub(crate) spells: SpellStore,
    pub(crate) skills: SkillStore,
    pub(crate) queries: QueryManager,

    log: VecDeque<DrawExtInfo>,
    scrollback: usize,
    completed: VecDeque<Query>,
    completed_cap: usize,

    pub(crate) characters: Vec<Character>,
    pub(crate) last_failure: Option<String>,
    pub(crate) server_ticks: bool,
    next_stage: Option<Stage>,
}

impl World {
    pub(crate) fn new(config: &ClientConfig, out: Arc<dyn Outbound>) -> Result<Self, ClientError> {
        let board = match config.board_seed {
            Some(seed) => BoardManager::with_seed(config.board.clone(), seed)?,
            None => BoardManager::new(config.board.clone())?,
        };
        Ok(Self {
            out,
            settings: Settings {
                client_name: config.client_name.clone(),
                account: config.account.clone(),
                password: config.password.clone(),
                face_set: config.face_set,
                viewport: config.viewport(),
            },
            auto_character: config.character.clone(),
            faces: FaceStore::new(),
            board,
            items: ItemStore::new(),
            spells: SpellStore::new(),
            skills: SkillStore::new(),
            queries: QueryManager::new(config.query_config()),
            log: VecDeque::new(),
            scrollback: config.scrollback,
            completed: VecDeque::new(),
            completed_cap: config.completed_queries,
            characters: Vec::new(),
            last_failure: None,
            server_ticks: false,
            next_stage: None,
        })
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn faces(&self) -> &FaceStore {
        &self.faces
    }

    pub fn board(&self) -> &BoardManager {
        &self.board
    }

    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    pub fn spells(&self) -> &SpellStore {
        &self.spells
    }

    /// Skill definitions, the player's skills, and the experience table.
    pub fn skills(&self) -> &SkillStore {
        &self.skills
    }

    pub fn queries(&self) -> &QueryManager {
        &self.queries
    }

    /// Characters of the logged-in account, as last listed by the server.
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    /// Reason given by the server for the last refused login or play
    /// request.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Whether the server paces animation itself.
    pub fn server_ticks(&self) -> bool {
        self.server_ticks
    }

    /// Text lines that no command or examine claimed, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &DrawExtInfo> {
        self.log.iter()
    }

    /// Takes the message log, leaving it empty.
    pub fn drain_messages(&mut self) -> Vec<DrawExtInfo> {
        self.log.drain(..).collect()
    }

    /// Takes the completed queries, oldest first.
    pub fn take_completed(&mut self) -> Vec<Query> {
        self.completed.drain(..).collect()
    }

    // =========================================================================
    // Requests
    // =========================================================================

    pub(crate) fn send(&self, msg: &Message) -> Result<(), TransportError> {
        self.out.send(msg)
    }

    /// Sends from a callback, where there is nobody to return an error to.
    /// A dead connection ends the session through the loss handler.
    pub(crate) fn send_or_warn(&self, msg: &Message) {
        if let Err(e) = self.out.send(msg) {
            tracing::warn!(kind = ?msg.kind(), error = %e, "send failed");
        }
    }

    pub(crate) fn send_command(&self, text: &str, repeat: u32) -> Result<PacketId, ClientError> {
        Ok(self.out.send_command(text, repeat)?)
    }

    pub(crate) fn query_simple(
        &mut self,
        cmd: &str,
        msg_type: u8,
        subtype: u8,
    ) -> Result<PacketId, ClientError> {
        Ok(self.queries.query_simple(&*self.out, cmd, msg_type, subtype)?)
    }

    pub(crate) fn issue(&mut self, cmd: StandardCommand) -> Result<PacketId, ClientError> {
        Ok(cmd.issue(&mut self.queries, &*self.out)?)
    }

    pub(crate) fn resubmit(&mut self, completed: &Query, input: &str) -> Result<PacketId, ClientError> {
        Ok(self.queries.resubmit(&*self.out, completed, input)?)
    }

    pub(crate) fn examine(&mut self, tag: Tag) -> Result<(), ClientError> {
        let request = self.items.request_examine(tag)?;
        self.send(&request)?;
        Ok(())
    }

    pub(crate) fn apply_item(&self, tag: Tag) -> Result<(), ClientError> {
        self.send(&Message::Apply(Apply { tag }))?;
        Ok(())
    }

    pub(crate) fn move_item(&self, tag: Tag, to: Tag, nrof: u32) -> Result<(), ClientError> {
        self.send(&Message::Move(MoveItem { to, tag, nrof }))?;
        Ok(())
    }

    // =========================================================================
    // Stage bookkeeping
    // =========================================================================

    /// Asks the session to move to `stage` once the current message has
    /// been dispatched. A later request replaces an earlier one.
    pub(crate) fn goto(&mut self, stage: Stage) {
        self.next_stage = Some(stage);
    }

    pub(crate) fn take_transition(&mut self) -> Option<Stage> {
        self.next_stage.take()
    }

    /// Forgets what only made sense inside the game.
    pub(crate) fn leave_game(&mut self) {
        self.items.clear();
        self.spells.clear();
        self.skills.clear();
        self.queries.clear();
        self.board.handle_new_map();
        self.server_ticks = false;
    }

    // =========================================================================
    // Message handling shared by the stages
    // =========================================================================

    pub(crate) fn on_face2(&mut self, face: &Face2) {
        if self.faces.announce(face) {
            self.send_or_warn(&Message::AskFace(AskFace { face: face.face }));
        }
    }

    pub(crate) fn on_image2(&mut self, image: &Image2) {
        if self.faces.add_image(image) {
            let resolved = self.board.face_loaded(image.face);
            if resolved > 0 {
                tracing::debug!(face = %image.face, resolved, "deferred faces placed");
            }
        }
    }

    pub(crate) fn on_anim(&mut self, anim: &Anim) {
        self.faces.add_anim(anim);
    }

    /// Offers a text line to the pending commands, then to the examine
    /// flow, and logs it if neither wants it.
    pub(crate) fn on_text(&mut self, info: &DrawExtInfo) {
        if self.queries.check_text(info) {
            return;
        }
        match self.items.accept_text(info) {
            ExamineOutcome::NotExamine => self.push_log(info.clone()),
            ExamineOutcome::ReRequest(request) => self.send_or_warn(&request),
            ExamineOutcome::Appended(_) | ExamineOutcome::Filtered => {}
        }
    }

    pub(crate) fn on_completed(&mut self, done: &CommandCompleted) {
        if let Some(query) = self.queries.check_completed(done) {
            if self.completed.len() >= self.completed_cap.max(1) {
                self.completed.pop_front();
            }
            self.completed.push_back(query);
        }
        self.queries.expire_stale();
    }

    pub(crate) fn on_server_tick(&mut self, tick: u32) {
        if !self.server_ticks {
            tracing::debug!(tick, "server paces animation");
            self.server_ticks = true;
        }
        self.board.handle_tick(tick, &self.faces);
    }

    /// Advances animation from the local ticker. Ignored once the server
    /// sends ticks itself. Returns whether the board was ticked.
    pub(crate) fn on_local_tick(&mut self, tick: u32) -> bool {
        self.queries.expire_stale();
        if self.server_ticks {
            return false;
        }
        self.board.handle_tick(tick, &self.faces);
        true
    }

    fn push_log(&mut self, info: DrawExtInfo) {
        if self.log.len() >= self.scrollback.max(1) {
            self.log.pop_front();
        }
        self.log.push_back(info);
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("faces", &self.faces.len())
            .field("objects", &self.items.len())
            .field("spells", &self.spells.len())
            .field("pending_queries", &self.queries.len())
            .field("log", &self.log.len())
            .field("characters", &self.characters.len())
            .field("server_ticks", &self.server_ticks)
            .finish_non_exhaustive()
    }
}
