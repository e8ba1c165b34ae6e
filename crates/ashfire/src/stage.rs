//! Session stages and the subscriptions each one holds.
//!
//! A stage is entered by registering its callbacks into a fresh [`Scope`]
//! and left by tearing that scope down, so nothing one stage listens to
//! leaks into the next. Callbacks request the next stage with
//! [`World::goto`]; the session switches after the message is dispatched.

use std::fmt;

use ashfire_dispatch::{Registry, Reply, Scope};
use ashfire_items::PlayerChange;
use ashfire_protocol::{
    AccountLogin, AccountPlay, InfoTopic, Message, MessageKind, PROTOCOL_VERSION, RequestInfo,
    Setup, Version,
};

use crate::world::World;

/// Where the session is in its life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the server's version, then for the setup answer.
    Handshake,
    /// Asking for image sets and logging into the account.
    Login,
    /// Logged in; the character list is known.
    Characters,
    /// In the game as `character`.
    Play { character: String },
    /// Finished, with the reason. Nothing is dispatched any more.
    Ended(String),
}

impl Stage {
    pub fn is_playing(&self) -> bool {
        matches!(self, Stage::Play { .. })
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Stage::Ended(_))
    }

    /// Short name used for the stage's scope in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Handshake => "handshake",
            Stage::Login => "login",
            Stage::Characters => "characters",
            Stage::Play { .. } => "play",
            Stage::Ended(_) => "ended",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Handshake => f.write_str("shaking hands"),
            Stage::Login => f.write_str("logging in"),
            Stage::Characters => f.write_str("choosing a character"),
            Stage::Play { character } => write!(f, "playing as {character}"),
            Stage::Ended(reason) => write!(f, "ended ({reason})"),
        }
    }
}

/// Registers `stage`'s subscriptions into `scope` and sends what the stage
/// opens with.
pub(crate) fn enter(stage: &Stage, registry: &mut Registry<World>, scope: &mut Scope, world: &mut World) {
    match stage {
        Stage::Handshake => handshake(registry, scope),
        Stage::Login => login(registry, scope, world),
        Stage::Characters => characters(registry, scope, world),
        Stage::Play { character } => play(registry, scope, world, character),
        Stage::Ended(_) => registry.clear(),
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

fn handshake(registry: &mut Registry<World>, scope: &mut Scope) {
    scope.once(registry, MessageKind::Version, Some(MessageKind::Version), |world, reply| {
        let version = match reply {
            Reply::Failure(failure) => {
                world.goto(Stage::Ended(format!("version refused: {}", failure.reason)));
                return;
            }
            Reply::Message(Message::Version(version)) => version,
            Reply::Message(_) => return,
        };
        if version.sv_version != PROTOCOL_VERSION {
            tracing::error!(
                server = %version.sv_version,
                client = PROTOCOL_VERSION,
                "protocol version mismatch"
            );
            world.goto(Stage::Ended(format!(
                "server speaks protocol {}, expected {PROTOCOL_VERSION}",
                version.sv_version
            )));
            return;
        }
        tracing::info!(server = %version.sv_name, version = %version.sv_version, "server version accepted");

        world.send_or_warn(&Message::Version(Version {
            cl_version: PROTOCOL_VERSION.to_owned(),
            sv_version: String::new(),
            sv_name: world.settings.client_name.clone(),
        }));
        world.send_or_warn(&Message::Setup(Setup {
            face_cache: Some(true),
            login_method: Some("2".into()),
            extended_stats: Some(true),
            sound: Some(1),
            ..Default::default()
        }));
    });

    scope.once(registry, MessageKind::Setup, None, |world, _| {
        world.goto(Stage::Login);
    });
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

fn login(registry: &mut Registry<World>, scope: &mut Scope, world: &mut World) {
    subscribe_assets(registry, scope);
    subscribe_face_set(registry, scope);

    scope.on(registry, MessageKind::ReplyInfo, None, |world, reply| {
        let Some(Message::ReplyInfo(info)) = reply.message() else {
            return;
        };
        world.faces.set_face_sets(info.image_sets.iter().cloned());
        if let Some(set) = world.settings.face_set {
            if !world.faces.select_set(set) {
                tracing::warn!(set, "configured image set not offered by the server");
            }
        }
    });

    scope.on(
        registry,
        MessageKind::AccountPlayers,
        Some(MessageKind::AccountLogin),
        |world, reply| match reply {
            Reply::Failure(failure) => {
                tracing::warn!(reason = %failure.reason, "login refused");
                world.last_failure = Some(failure.reason.clone());
            }
            Reply::Message(Message::AccountPlayers(players)) => {
                tracing::info!(characters = players.characters.len(), "logged in");
                world.last_failure = None;
                world.characters = players.characters.clone();
                world.goto(Stage::Characters);
            }
            Reply::Message(_) => {}
        },
    );

    world.send_or_warn(&Message::RequestInfo(RequestInfo {
        topic: InfoTopic::ImageInfo,
    }));
    if world.settings.account.is_empty() {
        tracing::debug!("no account configured, waiting for login");
    } else {
        send_login(world);
    }
}

/// Sends the configured account credentials.
pub(crate) fn send_login(world: &World) {
    tracing::debug!(account = %world.settings.account, "logging in");
    world.send_or_warn(&Message::AccountLogin(AccountLogin {
        account: world.settings.account.clone(),
        password: world.settings.password.clone(),
    }));
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

fn characters(registry: &mut Registry<World>, scope: &mut Scope, world: &mut World) {
    subscribe_assets(registry, scope);
    subscribe_face_set(registry, scope);
    subscribe_character_list(registry, scope);

    let Some(name) = world.auto_character.take() else {
        return;
    };
    if world.characters.iter().any(|c| c.name == name) {
        world.goto(Stage::Play { character: name });
    } else {
        tracing::warn!(character = %name, "configured character is not on this account");
    }
}

fn subscribe_character_list(registry: &mut Registry<World>, scope: &mut Scope) {
    scope.on(registry, MessageKind::AccountPlayers, None, |world, reply| {
        if let Some(Message::AccountPlayers(players)) = reply.message() {
            world.characters = players.characters.clone();
        }
    });
}

// ---------------------------------------------------------------------------
// Play
// ---------------------------------------------------------------------------

fn play(registry: &mut Registry<World>, scope: &mut Scope, world: &mut World, character: &str) {
    subscribe_assets(registry, scope);
    subscribe_character_list(registry, scope);

    scope.on(
        registry,
        MessageKind::AccountPlay,
        Some(MessageKind::AccountPlay),
        |world, reply| {
            if let Reply::Failure(failure) = reply {
                tracing::warn!(reason = %failure.reason, "play refused");
                world.last_failure = Some(failure.reason.clone());
                world.goto(Stage::Characters);
            }
        },
    );

    scope.on(registry, MessageKind::Setup, None, |world, reply| {
        let Some(Message::Setup(setup)) = reply.message() else {
            return;
        };
        if let Some(set) = setup.face_set {
            world.faces.select_set(set);
        }
        if let Err(e) = world.board.handle_setup(setup) {
            tracing::warn!(error = %e, "ignoring map size");
        }
    });

    scope.on(registry, MessageKind::Map2, None, |world, reply| {
        if let Some(Message::Map2(map)) = reply.message() {
            world.board.handle_map2(map, &world.faces);
        }
    });
    scope.on(registry, MessageKind::NewMap, None, |world, _| world.board.handle_new_map());
    scope.on(registry, MessageKind::Tick, None, |world, reply| {
        if let Some(Message::Tick(tick)) = reply.message() {
            world.on_server_tick(tick.tick);
        }
    });

    scope.on(registry, MessageKind::Player, None, |world, reply| {
        let Some(Message::Player(player)) = reply.message() else {
            return;
        };
        if world.items.handle_player(player) == PlayerChange::Left {
            world.goto(Stage::Characters);
        }
    });
    scope.on(registry, MessageKind::Item2, None, |world, reply| {
        if let Some(Message::Item2(item2)) = reply.message() {
            world.items.handle_item2(item2);
        }
    });
    scope.on(registry, MessageKind::UpdateItem, None, |world, reply| {
        if let Some(Message::UpdateItem(update)) = reply.message() {
            world.items.handle_update_item(update);
        }
    });
    scope.on(registry, MessageKind::DeleteItem, None, |world, reply| {
        if let Some(Message::DeleteItem(delete)) = reply.message() {
            world.items.handle_delete_item(delete);
        }
    });
    scope.on(registry, MessageKind::DeleteInventory, None, |world, reply| {
        if let Some(Message::DeleteInventory(delete)) = reply.message() {
            world.items.handle_delete_inventory(delete);
        }
    });

    subscribe_spells_and_skills(registry, scope);

    scope.on(registry, MessageKind::DrawExtInfo, None, |world, reply| {
        if let Some(Message::DrawExtInfo(info)) = reply.message() {
            world.on_text(info);
        }
    });
    scope.on(registry, MessageKind::CommandCompleted, None, |world, reply| {
        if let Some(Message::CommandCompleted(done)) = reply.message() {
            world.on_completed(done);
        }
    });

    tracing::info!(%character, "entering the game");
    world.send_or_warn(&Message::AccountPlay(AccountPlay {
        character: character.to_owned(),
    }));
    let request = world
        .board
        .map_size_request(world.settings.viewport, world.faces.cell_size());
    world.send_or_warn(&request);
    for topic in [InfoTopic::SkillInfo, InfoTopic::SkillExtra, InfoTopic::ExpTable] {
        world.send_or_warn(&Message::RequestInfo(RequestInfo { topic }));
    }
}

/// Spells, skills and experience.
fn subscribe_spells_and_skills(registry: &mut Registry<World>, scope: &mut Scope) {
    scope.on(registry, MessageKind::AddSpell, None, |world, reply| {
        if let Some(Message::AddSpell(add)) = reply.message() {
            world.spells.handle_add_spell(add);
        }
    });
    scope.on(registry, MessageKind::UpdateSpell, None, |world, reply| {
        if let Some(Message::UpdateSpell(update)) = reply.message() {
            world.spells.handle_update_spell(update);
        }
    });
    scope.on(registry, MessageKind::DeleteSpell, None, |world, reply| {
        if let Some(Message::DeleteSpell(delete)) = reply.message() {
            if !world.spells.handle_delete_spell(delete) {
                tracing::debug!(tag = %delete.tag, "delete for unknown spell ignored");
            }
        }
    });
    scope.on(registry, MessageKind::Stats, None, |world, reply| {
        if let Some(Message::Stats(stats)) = reply.message() {
            world.skills.handle_stats(stats);
        }
    });
    scope.on(registry, MessageKind::ReplyInfo, None, |world, reply| {
        if let Some(Message::ReplyInfo(info)) = reply.message() {
            world.skills.handle_reply_info(info);
        }
    });
}

// ---------------------------------------------------------------------------
// Shared subscriptions
// ---------------------------------------------------------------------------

/// Face announcements, images and animations. Any stage after the
/// handshake may receive them.
fn subscribe_assets(registry: &mut Registry<World>, scope: &mut Scope) {
    scope.on(registry, MessageKind::Face2, None, |world, reply| {
        if let Some(Message::Face2(face)) = reply.message() {
            world.on_face2(face);
        }
    });
    scope.on(registry, MessageKind::Image2, None, |world, reply| {
        if let Some(Message::Image2(image)) = reply.message() {
            world.on_image2(image);
        }
    });
    scope.on(registry, MessageKind::Anim, None, |world, reply| {
        if let Some(Message::Anim(anim)) = reply.message() {
            world.on_anim(anim);
        }
    });
}

/// Setup answers outside the game only change the image set.
fn subscribe_face_set(registry: &mut Registry<World>, scope: &mut Scope) {
    scope.on(registry, MessageKind::Setup, None, |world, reply| {
        if let Some(Message::Setup(Setup {
            face_set: Some(set), ..
        })) = reply.message()
        {
            world.faces.select_set(*set);
        }
    });
}
