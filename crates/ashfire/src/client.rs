//! `Client`: a connection wired to a session.
//!
//! This is the entry point for talking to a game server. It ties together
//! all the layers: transport → dispatch → stages → models.
//!
//! The session lives behind a mutex shared by the connection's read task
//! (which dispatches every message), the local ticker, and the caller's
//! getters and actions. Dispatch itself only ever happens on the read task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ashfire_protocol::{Codec, PacketId, Tag};
use ashfire_query::{Query, StandardCommand};
use ashfire_tick::spawn_ticker;
use ashfire_transport::{Connection, Outbound};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ClientError;
use crate::config::ClientConfig;
use crate::session::Session;
use crate::stage::Stage;
use crate::world::World;

/// A connected client.
///
/// # Example
///
/// ```rust,ignore
/// let mut config = ClientConfig::default();
/// config.apply_env();
/// let client = Client::join(config, JsonCodec).await?;
/// client.wait_for(Stage::is_playing, Duration::from_secs(10)).await;
/// client.send_command("who")?;
/// ```
pub struct Client<C: Codec> {
    conn: Connection<C>,
    session: Arc<Mutex<Session>>,
    stage_rx: watch::Receiver<Stage>,
    shutdown: watch::Sender<bool>,
    ticker: Option<JoinHandle<()>>,
}

impl<C: Codec> Client<C> {
    /// Dials `config.server` and starts the session.
    ///
    /// # Errors
    /// [`ClientError::Transport`] when the dial fails or times out, or
    /// [`ClientError::Board`] when the configured board can't be allocated.
    pub async fn join(config: ClientConfig, codec: C) -> Result<Self, ClientError> {
        let conn = Connection::join(&config.server, codec).await?;
        Self::start(conn, &config)
    }

    /// Starts a session over an already established stream.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`ClientError::Board`] when the configured board can't be allocated.
    pub fn attach<S>(stream: S, codec: C, config: &ClientConfig) -> Result<Self, ClientError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::start(Connection::attach(stream, codec), config)
    }

    fn start(conn: Connection<C>, config: &ClientConfig) -> Result<Self, ClientError> {
        let out: Arc<dyn Outbound> = Arc::new(conn.clone());
        let session = match Session::new(config, out) {
            Ok(session) => Arc::new(Mutex::new(session)),
            Err(e) => {
                conn.close();
                return Err(e);
            }
        };
        let stage_rx = lock(&session).subscribe();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let on_loss = Arc::clone(&session);
        conn.set_on_loss(Box::new(move |err| {
            lock(&on_loss).end(format!("connection lost: {err}"));
        }));

        let dispatch = Arc::clone(&session);
        conn.set_message_handler(Some(Box::new(move |msg| {
            lock(&dispatch).handle(&msg);
        })));

        let ticker = config.local_ticker.then(|| {
            let ticking = Arc::clone(&session);
            spawn_ticker(config.tick.clone(), shutdown_rx, move |tick| {
                lock(&ticking).local_tick(tick);
            })
        });

        tracing::debug!(id = %conn.id(), local_ticker = ticker.is_some(), "client started");
        Ok(Self {
            conn,
            session,
            stage_rx,
            shutdown,
            ticker,
        })
    }

    // =========================================================================
    // State
    // =========================================================================

    /// The current stage.
    pub fn stage(&self) -> Stage {
        lock(&self.session).stage().clone()
    }

    /// Follows stage changes.
    pub fn stage_changes(&self) -> watch::Receiver<Stage> {
        self.stage_rx.clone()
    }

    /// Waits until the stage satisfies `pred`, or the session ends, or
    /// `timeout` passes. Returns the stage seen last.
    pub async fn wait_for(&self, pred: impl Fn(&Stage) -> bool, timeout: Duration) -> Stage {
        let mut rx = self.stage_rx.clone();
        let wait = rx.wait_for(|s| pred(s) || s.is_ended());
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(stage)) => stage.clone(),
            _ => self.stage(),
        }
    }

    /// Runs `f` against the world. Keep it short; message dispatch waits.
    pub fn with_world<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(lock(&self.session).world())
    }

    /// Like [`with_world`](Self::with_world), for taking logs and
    /// completed queries.
    pub fn with_world_mut<R>(&self, f: impl FnOnce(&mut World) -> R) -> R {
        f(lock(&self.session).world_mut())
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    // =========================================================================
    // Actions
    // =========================================================================

    pub fn login(&self, account: &str, password: &str) -> Result<(), ClientError> {
        lock(&self.session).login(account, password)
    }

    pub fn play(&self, character: &str) -> Result<(), ClientError> {
        lock(&self.session).play(character)
    }

    pub fn send_command(&self, text: &str) -> Result<PacketId, ClientError> {
        lock(&self.session).send_command(text)
    }

    pub fn query_simple(&self, cmd: &str, msg_type: u8, subtype: u8) -> Result<PacketId, ClientError> {
        lock(&self.session).query_simple(cmd, msg_type, subtype)
    }

    pub fn issue(&self, cmd: StandardCommand) -> Result<PacketId, ClientError> {
        lock(&self.session).issue(cmd)
    }

    pub fn resubmit(&self, completed: &Query, input: &str) -> Result<PacketId, ClientError> {
        lock(&self.session).resubmit(completed, input)
    }

    pub fn examine(&self, tag: Tag) -> Result<(), ClientError> {
        lock(&self.session).examine(tag)
    }

    pub fn apply_item(&self, tag: Tag) -> Result<(), ClientError> {
        lock(&self.session).apply_item(tag)
    }

    pub fn move_item(&self, tag: Tag, to: Tag, nrof: u32) -> Result<(), ClientError> {
        lock(&self.session).move_item(tag, to, nrof)
    }

    /// Closes the connection and ends the session. Idempotent.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
        self.conn.set_message_handler(None);
        self.conn.set_on_loss(Box::new(|_| {}));
        self.conn.close();
        lock(&self.session).end("closed");
    }

    /// Closes the client and waits for the local ticker to stop.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(ticker) = self.ticker.take() {
            if let Err(e) = ticker.await {
                tracing::warn!(error = %e, "local ticker panicked");
            }
        }
    }
}

impl<C: Codec> Drop for Client<C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Locks the session, recovering from a panicked holder.
fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
