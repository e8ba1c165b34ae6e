//! The session: dispatch registry, world and current stage.
//!
//! Every server message goes through [`Session::handle`], which runs the
//! matching callbacks against the [`World`] and then performs any stage
//! change they asked for. Stage changes never happen mid-dispatch.

use std::sync::Arc;

use ashfire_dispatch::{Registry, Scope};
use ashfire_protocol::{Message, PacketId, Tag};
use ashfire_query::{Query, StandardCommand};
use ashfire_transport::Outbound;
use tokio::sync::watch;

use crate::ClientError;
use crate::config::ClientConfig;
use crate::stage::{self, Stage};
use crate::world::World;

/// One logical session with the server, independent of the socket.
pub struct Session {
    registry: Registry<World>,
    world: World,
    stage: Stage,
    scope: Scope,
    stage_tx: watch::Sender<Stage>,
}

impl Session {
    /// Creates a session in the handshake stage, waiting for the server's
    /// version.
    ///
    /// # Errors
    /// [`ClientError::Board`] when the configured board can't be allocated.
    pub fn new(config: &ClientConfig, out: Arc<dyn Outbound>) -> Result<Self, ClientError> {
        let (stage_tx, _) = watch::channel(Stage::Handshake);
        let mut session = Self {
            registry: Registry::new(),
            world: World::new(config, out)?,
            stage: Stage::Handshake,
            scope: Scope::new(Stage::Handshake.name()),
            stage_tx,
        };
        stage::enter(
            &Stage::Handshake,
            &mut session.registry,
            &mut session.scope,
            &mut session.world,
        );
        session.apply_transitions();
        Ok(session)
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Follows stage changes.
    pub fn subscribe(&self) -> watch::Receiver<Stage> {
        self.stage_tx.subscribe()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Dispatches one server message. Returns how many callbacks ran.
    pub fn handle(&mut self, msg: &Message) -> usize {
        if self.stage.is_ended() {
            tracing::trace!(kind = ?msg.kind(), "message after end ignored");
            return 0;
        }
        let fired = self.registry.dispatch(&mut self.world, msg);
        if fired == 0 {
            tracing::trace!(kind = ?msg.kind(), stage = self.stage.name(), "no subscriber");
        }
        self.apply_transitions();
        fired
    }

    /// Ends the session. Later messages are ignored.
    pub fn end(&mut self, reason: impl Into<String>) {
        if self.stage.is_ended() {
            return;
        }
        self.world.goto(Stage::Ended(reason.into()));
        self.apply_transitions();
    }

    /// Animation step from the local ticker.
    pub fn local_tick(&mut self, tick: u32) -> bool {
        self.stage.is_playing() && self.world.on_local_tick(tick)
    }

    // =========================================================================
    // Player actions
    // =========================================================================

    /// Logs into `account`. Only while logging in; a refusal is reported in
    /// [`World::last_failure`].
    pub fn login(&mut self, account: &str, password: &str) -> Result<(), ClientError> {
        self.require(|s| matches!(s, Stage::Login), "login")?;
        self.world.settings.account = account.to_owned();
        self.world.settings.password = password.to_owned();
        stage::send_login(&self.world);
        Ok(())
    }

    /// Enters the game as `character`.
    pub fn play(&mut self, character: &str) -> Result<(), ClientError> {
        self.require(|s| matches!(s, Stage::Characters), "play")?;
        self.world.goto(Stage::Play {
            character: character.to_owned(),
        });
        self.apply_transitions();
        Ok(())
    }

    /// Sends a plain command without collecting its reply.
    pub fn send_command(&mut self, text: &str) -> Result<PacketId, ClientError> {
        self.require(Stage::is_playing, "sending a command")?;
        self.world.send_command(text, 0)
    }

    /// Sends a command and collects text tagged `(msg_type, subtype)`
    /// until its completion arrives.
    pub fn query_simple(
        &mut self,
        cmd: &str,
        msg_type: u8,
        subtype: u8,
    ) -> Result<PacketId, ClientError> {
        self.require(Stage::is_playing, "sending a command")?;
        self.world.query_simple(cmd, msg_type, subtype)
    }

    /// Sends a built-in command with its known reply shape.
    pub fn issue(&mut self, cmd: StandardCommand) -> Result<PacketId, ClientError> {
        self.require(Stage::is_playing, "sending a command")?;
        self.world.issue(cmd)
    }

    /// Answers a completed query that accepts input.
    pub fn resubmit(&mut self, completed: &Query, input: &str) -> Result<PacketId, ClientError> {
        self.require(Stage::is_playing, "sending a command")?;
        self.world.resubmit(completed, input)
    }

    pub fn examine(&mut self, tag: Tag) -> Result<(), ClientError> {
        self.require(Stage::is_playing, "examine")?;
        self.world.examine(tag)
    }

    pub fn apply_item(&mut self, tag: Tag) -> Result<(), ClientError> {
        self.require(Stage::is_playing, "apply")?;
        self.world.apply_item(tag)
    }

    /// Moves `nrof` of `tag` into `to` (0 = the whole stack).
    pub fn move_item(&mut self, tag: Tag, to: Tag, nrof: u32) -> Result<(), ClientError> {
        self.require(Stage::is_playing, "move")?;
        self.world.move_item(tag, to, nrof)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require(&self, allowed: impl Fn(&Stage) -> bool, action: &'static str) -> Result<(), ClientError> {
        if allowed(&self.stage) {
            Ok(())
        } else {
            Err(ClientError::WrongStage {
                action,
                stage: self.stage.to_string(),
            })
        }
    }

    fn apply_transitions(&mut self) {
        while let Some(next) = self.world.take_transition() {
            self.transition(next);
        }
    }

    fn transition(&mut self, next: Stage) {
        if self.stage.is_ended() {
            return;
        }
        self.scope.leave(&mut self.registry);
        if self.stage.is_playing() && !next.is_playing() {
            self.world.leave_game();
        }
        match &next {
            Stage::Ended(reason) => tracing::info!(from = self.stage.name(), %reason, "session ended"),
            _ => tracing::info!(from = self.stage.name(), to = next.name(), "stage changed"),
        }

        self.stage = next;
        self.scope = Scope::new(self.stage.name());
        stage::enter(&self.stage, &mut self.registry, &mut self.scope, &mut self.world);
        self.stage_tx.send_replace(self.stage.clone());
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("stage", &self.stage)
            .field("subscriptions", &self.registry.len())
            .field("world", &self.world)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use ashfire_protocol::{
        AccountPlayers, AddSpell, Character, CommandCompleted, DeleteSpell, DrawExtInfo, Failure,
        FaceSetInfo, InfoTopic, MessageKind, NewCommand, Player, ReplyInfo, Setup, Spell, Stat,
        Stats, Version, msg_subtype, msg_type,
    };
    use ashfire_transport::TransportError;

    /// Records every message the session sends.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Message>>,
        next_packet: Mutex<u32>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Message> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl Outbound for Recorder {
        fn send(&self, msg: &Message) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(msg.clone());
            Ok(())
        }

        fn send_command(&self, text: &str, repeat: u32) -> Result<PacketId, TransportError> {
            let mut next = self.next_packet.lock().unwrap();
            *next += 1;
            let packet = PacketId(*next);
            self.send(&Message::NewCommand(NewCommand {
                packet,
                repeat,
                command: text.into(),
            }))?;
            Ok(packet)
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            account: "ember".into(),
            password: "secret".into(),
            ..Default::default()
        }
    }

    fn session_with(config: &ClientConfig) -> (Session, Arc<Recorder>) {
        let out = Arc::new(Recorder::default());
        let session = Session::new(config, Arc::clone(&out) as Arc<dyn Outbound>).unwrap();
        (session, out)
    }

    fn server_version(v: &str) -> Message {
        Message::Version(Version {
            cl_version: String::new(),
            sv_version: v.into(),
            sv_name: "test server".into(),
        })
    }

    fn characters(names: &[&str]) -> Message {
        Message::AccountPlayers(AccountPlayers {
            characters: names
                .iter()
                .map(|n| Character {
                    name: (*n).into(),
                    ..Default::default()
                })
                .collect(),
        })
    }

    /// Drives a session to the character list.
    fn logged_in(config: &ClientConfig) -> (Session, Arc<Recorder>) {
        let (mut s, out) = session_with(config);
        s.handle(&server_version("1030"));
        s.handle(&Message::Setup(Setup::default()));
        s.handle(&characters(&["Ash", "Cinder"]));
        out.take();
        (s, out)
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    #[test]
    fn test_handshake_answers_version_and_setup() {
        let (mut s, out) = session_with(&config());
        assert_eq!(*s.stage(), Stage::Handshake);
        assert!(out.take().is_empty(), "the server speaks first");

        s.handle(&server_version("1030"));

        let sent = out.take();
        assert!(matches!(&sent[0], Message::Version(v) if v.cl_version == "1030" && v.sv_name == "ashfire"));
        assert!(matches!(&sent[1], Message::Setup(setup) if setup.face_cache == Some(true)));
        assert_eq!(*s.stage(), Stage::Handshake);
    }

    #[test]
    fn test_handshake_wrong_version_ends() {
        let (mut s, out) = session_with(&config());
        s.handle(&server_version("1029"));

        assert!(s.stage().is_ended());
        assert!(out.take().is_empty());
    }

    #[test]
    fn test_setup_answer_moves_to_login_and_logs_in() {
        let (mut s, out) = session_with(&config());
        s.handle(&server_version("1030"));
        out.take();

        s.handle(&Message::Setup(Setup::default()));

        assert_eq!(*s.stage(), Stage::Login);
        let sent = out.take();
        assert!(matches!(&sent[0], Message::RequestInfo(r) if r.topic == InfoTopic::ImageInfo));
        assert!(matches!(&sent[1], Message::AccountLogin(l) if l.account == "ember" && l.password == "secret"));
    }

    // =========================================================================
    // Login
    // =========================================================================

    #[test]
    fn test_login_refused_stays_and_records_reason() {
        let (mut s, _out) = session_with(&config());
        s.handle(&server_version("1030"));
        s.handle(&Message::Setup(Setup::default()));

        s.handle(&Message::Failure(Failure {
            command: MessageKind::AccountLogin,
            reason: "bad password".into(),
        }));

        assert_eq!(*s.stage(), Stage::Login);
        assert_eq!(s.world().last_failure(), Some("bad password"));
    }

    #[test]
    fn test_login_without_account_waits_for_explicit_login() {
        let (mut s, out) = session_with(&ClientConfig::default());
        s.handle(&server_version("1030"));
        s.handle(&Message::Setup(Setup::default()));
        let sent = out.take();
        assert!(!sent.iter().any(|m| matches!(m, Message::AccountLogin(_))));

        s.login("ember", "pw").unwrap();

        assert!(matches!(&out.take()[0], Message::AccountLogin(l) if l.account == "ember"));
    }

    #[test]
    fn test_reply_info_selects_configured_face_set() {
        let cfg = ClientConfig {
            face_set: Some(1),
            ..config()
        };
        let (mut s, _out) = session_with(&cfg);
        s.handle(&server_version("1030"));
        s.handle(&Message::Setup(Setup::default()));

        s.handle(&Message::ReplyInfo(ReplyInfo {
            topic: InfoTopic::ImageInfo,
            image_sets: vec![
                FaceSetInfo {
                    index: 0,
                    name: "classic".into(),
                    width: 32,
                    height: 32,
                },
                FaceSetInfo {
                    index: 1,
                    name: "large".into(),
                    width: 64,
                    height: 64,
                },
            ],
            ..ReplyInfo::new(InfoTopic::ImageInfo)
        }));

        assert_eq!(s.world().faces().cell_size(), (64, 64));
    }

    #[test]
    fn test_character_list_moves_to_characters() {
        let (s, _out) = logged_in(&config());
        assert_eq!(*s.stage(), Stage::Characters);
        assert_eq!(s.world().characters().len(), 2);
    }

    // =========================================================================
    // Play
    // =========================================================================

    #[test]
    fn test_configured_character_plays_automatically() {
        let cfg = ClientConfig {
            character: Some("Cinder".into()),
            ..config()
        };
        let (mut s, out) = session_with(&cfg);
        s.handle(&server_version("1030"));
        s.handle(&Message::Setup(Setup::default()));
        out.take();

        s.handle(&characters(&["Ash", "Cinder"]));

        assert_eq!(
            *s.stage(),
            Stage::Play {
                character: "Cinder".into()
            }
        );
        let sent = out.take();
        assert!(matches!(&sent[0], Message::AccountPlay(p) if p.character == "Cinder"));
        assert!(matches!(&sent[1], Message::Setup(setup) if setup.map_size.is_some()));
    }

    #[test]
    fn test_play_refused_returns_to_characters() {
        let (mut s, _out) = logged_in(&config());
        s.play("Ash").unwrap();
        assert!(s.stage().is_playing());

        s.handle(&Message::Failure(Failure {
            command: MessageKind::AccountPlay,
            reason: "already playing".into(),
        }));

        assert_eq!(*s.stage(), Stage::Characters);
        assert_eq!(s.world().last_failure(), Some("already playing"));
    }

    #[test]
    fn test_empty_player_returns_to_characters() {
        let (mut s, _out) = logged_in(&config());
        s.play("Ash").unwrap();
        s.handle(&Message::Player(Player {
            tag: Tag(7),
            name: "Ash".into(),
            ..Default::default()
        }));
        assert_eq!(s.world().items().player_tag(), Some(Tag(7)));

        s.handle(&Message::Player(Player::default()));

        assert_eq!(*s.stage(), Stage::Characters);
        assert!(s.world().items().is_empty());
    }

    #[test]
    fn test_play_outside_characters_is_rejected() {
        let (mut s, _out) = session_with(&config());
        assert!(matches!(s.play("Ash"), Err(ClientError::WrongStage { .. })));
        assert!(matches!(s.send_command("who"), Err(ClientError::WrongStage { .. })));
    }

    #[test]
    fn test_entering_play_asks_for_skill_topics() {
        let (mut s, out) = logged_in(&config());
        s.play("Ash").unwrap();

        let topics: Vec<InfoTopic> = out
            .take()
            .iter()
            .filter_map(|m| match m {
                Message::RequestInfo(r) => Some(r.topic),
                _ => None,
            })
            .collect();
        assert_eq!(
            topics,
            [InfoTopic::SkillInfo, InfoTopic::SkillExtra, InfoTopic::ExpTable]
        );
    }

    #[test]
    fn test_spells_and_skills_follow_messages_until_leaving() {
        let (mut s, _out) = logged_in(&config());
        s.play("Ash").unwrap();
        s.handle(&Message::Player(Player {
            tag: Tag(7),
            name: "Ash".into(),
            ..Default::default()
        }));

        s.handle(&Message::AddSpell(AddSpell {
            spells: vec![
                Spell {
                    tag: Tag(40),
                    name: "bless".into(),
                    ..Default::default()
                },
                Spell {
                    tag: Tag(41),
                    name: "heal".into(),
                    ..Default::default()
                },
            ],
        }));
        s.handle(&Message::DeleteSpell(DeleteSpell { tag: Tag(40) }));
        s.handle(&Message::ReplyInfo(ReplyInfo {
            exp_table: vec![0, 100, 300],
            ..ReplyInfo::new(InfoTopic::ExpTable)
        }));
        s.handle(&Message::Stats(Stats {
            stats: vec![Stat::Skill {
                skill: 5,
                level: 1,
                exp: 40,
            }],
        }));

        assert_eq!(s.world().spells().len(), 1);
        assert!(s.world().spells().find_by_name("heal").is_some());
        assert_eq!(s.world().skills().known(5).map(|k| k.exp), Some(40));
        assert_eq!(s.world().skills().exp_to_next_level(1, 40), 60);

        s.handle(&Message::Player(Player::default()));

        assert!(s.world().spells().is_empty());
        assert!(s.world().skills().exp_table().is_empty());
    }

    #[test]
    fn test_query_collects_text_and_completes() {
        let (mut s, out) = logged_in(&config());
        s.play("Ash").unwrap();
        out.take();

        let packet = s
            .query_simple("who", msg_type::COMMAND, msg_subtype::COMMAND_WHO)
            .unwrap();
        for line in ["a", "b"] {
            s.handle(&Message::DrawExtInfo(DrawExtInfo {
                color: 0,
                msg_type: msg_type::COMMAND,
                subtype: msg_subtype::COMMAND_WHO,
                message: line.into(),
            }));
        }
        s.handle(&Message::DrawExtInfo(DrawExtInfo {
            color: 0,
            msg_type: msg_type::COMMUNICATION,
            subtype: 1,
            message: "hello".into(),
        }));
        s.handle(&Message::CommandCompleted(CommandCompleted { packet, time: 0 }));

        let done = s.world_mut().take_completed();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].text, "a\nb");
        assert!(s.world().queries().is_empty());

        let log: Vec<_> = s.world_mut().drain_messages();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].message, "hello");
    }

    #[test]
    fn test_help_answer_offers_input_again() {
        let (mut s, out) = logged_in(&config());
        s.play("Ash").unwrap();
        out.take();

        let packet = s.issue(StandardCommand::Help).unwrap();
        s.handle(&Message::CommandCompleted(CommandCompleted { packet, time: 0 }));
        let help = s.world_mut().take_completed().remove(0);
        assert!(help.has_input);

        let next = s.resubmit(&help, "spells").unwrap();

        assert!(matches!(
            out.take().last(),
            Some(Message::NewCommand(cmd)) if cmd.command == "help spells" && cmd.packet == next
        ));
        assert!(s.world().queries().get(next).is_some_and(|q| q.has_input && q.repeat));
    }

    #[test]
    fn test_end_ignores_later_messages() {
        let (mut s, _out) = logged_in(&config());
        s.end("connection lost");

        assert_eq!(*s.stage(), Stage::Ended("connection lost".into()));
        assert_eq!(s.handle(&characters(&["Ash"])), 0);
    }

    #[test]
    fn test_subscribe_sees_stage_changes() {
        let (mut s, _out) = session_with(&config());
        let rx = s.subscribe();
        s.handle(&server_version("1030"));
        s.handle(&Message::Setup(Setup::default()));

        assert_eq!(*rx.borrow(), Stage::Login);
    }
}
