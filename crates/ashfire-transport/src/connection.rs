//! A live session with a game server.
//!
//! A [`Connection`] owns two background tasks:
//!
//! ```text
//!   socket ──read_frame──→ [read task] ──decode──→ handler (or queue)
//!   send() ──encode+frame──→ mpsc ──→ [write task] ──→ socket
//! ```
//!
//! The read task is the single delivery context: the installed message
//! handler always runs there, one message at a time. A handler that
//! panics kills the connection like a read error would. Outbound frames go
//! through one channel drained by the write task, so concurrent `send`
//! calls never interleave bytes on the wire.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ashfire_protocol::{Codec, DEFAULT_PORT, Message, NewCommand, PacketId};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

use crate::frame::{encode_frame, read_frame};
use crate::{ConnectionId, Outbound, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long [`Connection::join`] waits for the TCP handshake.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives every decoded message, in arrival order.
pub type MessageHandler = Box<dyn FnMut(Message) + Send>;

/// Receives the error that killed the connection. Called at most once.
pub type LossHandler = Box<dyn FnOnce(TransportError) + Send>;

/// A cheaply cloneable handle to one server connection.
pub struct Connection<C: Codec> {
    inner: Arc<Inner<C>>,
}

impl<C: Codec> Clone for Connection<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<C> {
    id: ConnectionId,
    codec: C,
    next_packet: AtomicU32,
    closed: AtomicBool,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    shutdown: watch::Sender<bool>,
    delivery: Mutex<Delivery>,
    on_loss: Mutex<Option<LossHandler>>,
}

/// Where decoded messages go: the handler if one is installed, otherwise
/// the queue. `generation` changes on every `set_message_handler` so the
/// read task can tell whether the handler it borrowed was replaced while
/// it was running.
#[derive(Default)]
struct Delivery {
    handler: Option<MessageHandler>,
    queue: VecDeque<Message>,
    generation: u64,
}

impl<C: Codec> Connection<C> {
    /// Dials `address` and starts the connection tasks.
    ///
    /// A missing port defaults to 13327. Nothing is started when the dial
    /// fails.
    ///
    /// # Errors
    /// [`TransportError::ConnectTimeout`] after [`DIAL_TIMEOUT`], or
    /// [`TransportError::ConnectFailed`] when the dial is refused.
    pub async fn join(address: &str, codec: C) -> Result<Self, TransportError> {
        Self::join_with_timeout(address, codec, DIAL_TIMEOUT).await
    }

    /// [`join`](Self::join) with an explicit dial timeout.
    pub async fn join_with_timeout(
        address: &str,
        codec: C,
        dial_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let addr = with_default_port(address);
        let stream = match tokio::time::timeout(dial_timeout, TcpStream::connect(&addr)).await {
            Err(_) => return Err(TransportError::ConnectTimeout(addr)),
            Ok(Err(source)) => return Err(TransportError::ConnectFailed { addr, source }),
            Ok(Ok(stream)) => stream,
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "could not disable Nagle");
        }

        let conn = Self::attach(stream, codec);
        tracing::info!(id = %conn.id(), %addr, "connected to server");
        Ok(conn)
    }

    /// Starts the connection tasks over an already established stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach<S>(stream: S, codec: C) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound, frames) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        let inner = Arc::new(Inner {
            id,
            codec,
            next_packet: AtomicU32::new(1),
            closed: AtomicBool::new(false),
            outbound,
            shutdown,
            delivery: Mutex::new(Delivery::default()),
            on_loss: Mutex::new(None),
        });

        tokio::spawn(read_loop(Arc::clone(&inner), reader, shutdown_rx.clone()));
        tokio::spawn(write_loop(Arc::clone(&inner), writer, frames, shutdown_rx));

        Self { inner }
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Whether the connection has been closed or lost.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Installs (or with `None`, removes) the message handler.
    ///
    /// Messages that arrived while no handler was installed are handed to
    /// the new handler first, in arrival order, on the calling context.
    /// Live dispatch resumes on the read task afterwards.
    pub fn set_message_handler(&self, handler: Option<MessageHandler>) {
        let mut delivery = lock(&self.inner.delivery);
        delivery.generation += 1;
        let generation = delivery.generation;

        let Some(mut handler) = handler else {
            delivery.handler = None;
            return;
        };

        // Drain outside the lock; the read task may queue more meanwhile,
        // so loop until the queue is observed empty.
        loop {
            if delivery.generation != generation {
                // Replaced again while we were draining.
                return;
            }
            if delivery.queue.is_empty() {
                delivery.handler = Some(handler);
                return;
            }
            let queued: Vec<Message> = delivery.queue.drain(..).collect();
            drop(delivery);
            tracing::debug!(id = %self.inner.id, count = queued.len(), "draining queued messages");
            for msg in queued {
                handler(msg);
            }
            delivery = lock(&self.inner.delivery);
        }
    }

    /// Installs the handler told about a fatal read, write or decode error.
    ///
    /// Without one, the loss is logged at `error` level. An explicit
    /// [`close`](Self::close) is not a loss and never reaches it.
    pub fn set_on_loss(&self, handler: LossHandler) {
        *lock(&self.inner.on_loss) = Some(handler);
    }

    /// Number of messages waiting for a handler.
    pub fn queued(&self) -> usize {
        lock(&self.inner.delivery).queue.len()
    }

    /// Encodes, frames and queues a message for the write task.
    ///
    /// # Errors
    /// - [`TransportError::ConnectionClosed`] after close or loss
    /// - [`TransportError::Protocol`] if the codec fails
    /// - [`TransportError::EmptyMessage`] if the encoding is empty
    /// - [`TransportError::FrameTooLarge`] over 65535 bytes
    pub fn send(&self, msg: &Message) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed("send after close".into()));
        }
        let payload = self.inner.codec.encode(msg)?;
        if payload.is_empty() {
            return Err(TransportError::EmptyMessage);
        }
        let frame = encode_frame(&payload)?;
        self.inner
            .outbound
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed("writer stopped".into()))?;
        tracing::trace!(id = %self.inner.id, kind = ?msg.kind(), "queued frame");
        Ok(())
    }

    /// Sends `text` as a command carrying the next packet ID.
    ///
    /// IDs start at 1 and strictly increase for the lifetime of the
    /// connection. A failed send still consumes its ID.
    pub fn send_command(&self, text: &str, repeat: u32) -> Result<PacketId, TransportError> {
        let packet = PacketId(self.inner.next_packet.fetch_add(1, Ordering::Relaxed));
        self.send(&Message::NewCommand(NewCommand {
            packet,
            repeat,
            command: text.to_owned(),
        }))?;
        tracing::debug!(id = %self.inner.id, %packet, command = text, "command sent");
        Ok(packet)
    }

    /// Closes the connection. Frames already queued are still written.
    ///
    /// Idempotent: later calls do nothing.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.shutdown.send(true);
        tracing::info!(id = %self.inner.id, "connection closed");
    }
}

impl<C: Codec> Outbound for Connection<C> {
    fn send(&self, msg: &Message) -> Result<(), TransportError> {
        Connection::send(self, msg)
    }

    fn send_command(&self, text: &str, repeat: u32) -> Result<PacketId, TransportError> {
        Connection::send_command(self, text, repeat)
    }
}

impl<C> Inner<C> {
    /// Hands one message to the handler, or queues it.
    ///
    /// # Errors
    /// [`TransportError::HandlerPanicked`] if the handler panicked. The
    /// handler is dropped.
    fn deliver(&self, msg: Message) -> Result<(), TransportError> {
        let mut delivery = lock(&self.delivery);
        let Some(mut handler) = delivery.handler.take() else {
            delivery.queue.push_back(msg);
            return Ok(());
        };
        let generation = delivery.generation;
        drop(delivery);

        let kind = msg.kind();
        // The handler may call `set_message_handler` itself.
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(msg))) {
            return Err(TransportError::HandlerPanicked {
                kind: format!("{kind:?}"),
                reason: panic_reason(payload.as_ref()),
            });
        }

        let mut delivery = lock(&self.delivery);
        if delivery.generation == generation && delivery.handler.is_none() {
            delivery.handler = Some(handler);
        }
        Ok(())
    }

    /// Marks the connection dead and reports the loss exactly once.
    fn fail(&self, err: TransportError) {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(id = %self.id, error = %err, "error after close ignored");
            return;
        }
        let _ = self.shutdown.send(true);

        let handler = lock(&self.on_loss).take();
        match handler {
            Some(handler) => {
                tracing::warn!(id = %self.id, error = %err, "connection lost");
                handler(err);
            }
            None => tracing::error!(id = %self.id, error = %err, "connection lost"),
        }
    }
}

async fn read_loop<C, R>(inner: Arc<Inner<C>>, mut reader: R, mut shutdown: watch::Receiver<bool>)
where
    C: Codec,
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => break,
            frame = read_frame(&mut reader) => frame,
        };
        let decoded = frame.and_then(|payload| {
            inner
                .codec
                .decode::<Message>(&payload)
                .map_err(TransportError::from)
        });
        if let Err(e) = decoded.and_then(|msg| inner.deliver(msg)) {
            inner.fail(e);
            break;
        }
    }
    tracing::debug!(id = %inner.id, "read loop stopped");
}

async fn write_loop<C, W>(
    inner: Arc<Inner<C>>,
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) where
    C: Codec,
    W: AsyncWrite + Unpin,
{
    loop {
        // `biased` drains already queued frames before honouring shutdown.
        let frame = tokio::select! {
            biased;
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = shutdown.changed() => break,
        };
        let written = match writer.write_all(&frame).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            inner.fail(TransportError::SendFailed(e));
            break;
        }
    }
    let _ = writer.shutdown().await;
    tracing::debug!(id = %inner.id, "write loop stopped");
}

/// Appends the default port unless the address already names one.
///
/// Bare IPv6 literals must be bracketed (`[::1]`) to get a default port.
pub fn with_default_port(address: &str) -> String {
    let has_port = if address.starts_with('[') {
        address.contains("]:")
    } else {
        address.contains(':')
    };
    if has_port {
        address.to_owned()
    } else {
        format!("{address}:{DEFAULT_PORT}")
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
