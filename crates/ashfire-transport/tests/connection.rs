//! Integration tests for `Connection`.
//!
//! Most tests attach a connection to one end of an in-memory duplex pipe
//! and play the server on the other end with the raw framing helpers.
//! One test dials a real TCP listener to cover `join`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ashfire_protocol::{
    Codec, JsonCodec, Message, NewCommand, PacketId, ProtocolError, Tick,
};
use ashfire_transport::{Connection, Outbound, TransportError, read_frame, write_frame};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn pair() -> (Connection<JsonCodec>, DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    (Connection::attach(client, JsonCodec), server)
}

async fn server_send(server: &mut DuplexStream, msg: &Message) {
    let bytes = JsonCodec.encode(msg).unwrap();
    write_frame(server, &bytes).await.unwrap();
}

async fn server_recv(server: &mut DuplexStream) -> Message {
    let payload = tokio::time::timeout(Duration::from_secs(5), read_frame(server))
        .await
        .expect("frame should arrive")
        .expect("frame should decode");
    JsonCodec.decode(&payload).unwrap()
}

fn tick(n: u32) -> Message {
    Message::Tick(Tick { tick: n })
}

/// Installs a handler that forwards every message into a channel.
fn collect(conn: &Connection<JsonCodec>) -> mpsc::UnboundedReceiver<Message> {
    let (tx, rx) = mpsc::unbounded_channel();
    conn.set_message_handler(Some(Box::new(move |msg| {
        let _ = tx.send(msg);
    })));
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("message should arrive")
        .expect("channel open")
}

/// A codec whose encoder always produces zero bytes.
struct EmptyCodec;

impl Codec for EmptyCodec {
    fn encode<T: serde::Serialize>(&self, _value: &T) -> Result<Vec<u8>, ProtocolError> {
        Ok(Vec::new())
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        JsonCodec.decode(data)
    }
}

// =========================================================================
// Delivery
// =========================================================================

#[tokio::test]
async fn test_handler_receives_messages_in_order() {
    let (conn, mut server) = pair();
    let mut rx = collect(&conn);

    for n in 1..=3 {
        server_send(&mut server, &tick(n)).await;
    }

    assert_eq!(next(&mut rx).await, tick(1));
    assert_eq!(next(&mut rx).await, tick(2));
    assert_eq!(next(&mut rx).await, tick(3));
}

#[tokio::test]
async fn test_messages_queue_until_handler_installed() {
    let (conn, mut server) = pair();

    server_send(&mut server, &tick(1)).await;
    server_send(&mut server, &tick(2)).await;

    // Wait for the read task to queue both.
    for _ in 0..100 {
        if conn.queued() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(conn.queued(), 2);

    let mut rx = collect(&conn);
    assert_eq!(conn.queued(), 0);
    server_send(&mut server, &tick(3)).await;

    assert_eq!(next(&mut rx).await, tick(1));
    assert_eq!(next(&mut rx).await, tick(2));
    assert_eq!(next(&mut rx).await, tick(3));
}

#[tokio::test]
async fn test_removing_handler_resumes_queueing() {
    let (conn, mut server) = pair();
    let mut rx = collect(&conn);
    server_send(&mut server, &tick(1)).await;
    assert_eq!(next(&mut rx).await, tick(1));

    conn.set_message_handler(None);
    server_send(&mut server, &tick(2)).await;
    for _ in 0..100 {
        if conn.queued() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(conn.queued(), 1);
    assert!(rx.try_recv().is_err(), "old handler must not see tick 2");
}

// =========================================================================
// Sending
// =========================================================================

#[tokio::test]
async fn test_send_writes_length_prefixed_payload() {
    let (conn, mut server) = pair();

    conn.send(&tick(9)).expect("send should succeed");

    assert_eq!(server_recv(&mut server).await, tick(9));
}

#[tokio::test]
async fn test_send_command_ids_start_at_one_and_increase() {
    let (conn, mut server) = pair();

    let ids: Vec<PacketId> = (0..5)
        .map(|i| conn.send_command(&format!("cmd {i}"), 0).unwrap())
        .collect();

    assert_eq!(ids, (1..=5).map(PacketId).collect::<Vec<_>>());
    for (i, id) in ids.iter().enumerate() {
        let msg = server_recv(&mut server).await;
        assert_eq!(
            msg,
            Message::NewCommand(NewCommand {
                packet: *id,
                repeat: 0,
                command: format!("cmd {i}"),
            })
        );
    }
}

#[tokio::test]
async fn test_send_through_outbound_trait_object() {
    let (conn, mut server) = pair();
    let out: Arc<dyn Outbound> = Arc::new(conn.clone());

    let id = out.send_command("who", 2).unwrap();

    assert_eq!(id, PacketId(1));
    assert!(matches!(
        server_recv(&mut server).await,
        Message::NewCommand(NewCommand { repeat: 2, .. })
    ));
}

#[tokio::test]
async fn test_send_empty_encoding_is_rejected() {
    let (client, _server) = tokio::io::duplex(1024);
    let conn = Connection::attach(client, EmptyCodec);

    let result = conn.send(&tick(1));

    assert!(matches!(result, Err(TransportError::EmptyMessage)));
    assert!(!conn.is_closed(), "a rejected send is not fatal");
}

// =========================================================================
// Loss and close
// =========================================================================

#[tokio::test]
async fn test_peer_disconnect_fires_on_loss_once() {
    let (conn, server) = pair();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = Arc::clone(&calls);
    conn.set_on_loss(Box::new(move |err| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(err);
    }));

    drop(server);

    let err = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("loss should be reported")
        .expect("channel open");
    assert!(matches!(err, TransportError::ConnectionClosed(_)));
    assert!(conn.is_closed());

    // A later close must not report again.
    conn.close();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_decode_error_is_fatal() {
    let (conn, mut server) = pair();
    let (tx, mut rx) = mpsc::unbounded_channel();
    conn.set_on_loss(Box::new(move |err| {
        let _ = tx.send(err);
    }));

    write_frame(&mut server, b"definitely not a message").await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("loss should be reported")
        .expect("channel open");
    assert!(matches!(err, TransportError::Protocol(ProtocolError::Decode(_))));
    assert!(matches!(
        conn.send(&tick(1)),
        Err(TransportError::ConnectionClosed(_))
    ));
}

#[tokio::test]
async fn test_panicking_handler_is_a_loss_reported_once() {
    let (conn, mut server) = pair();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = Arc::clone(&calls);
    conn.set_on_loss(Box::new(move |err| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(err);
    }));
    conn.set_message_handler(Some(Box::new(|msg| {
        if msg == tick(2) {
            panic!("bad tick");
        }
    })));

    server_send(&mut server, &tick(1)).await;
    server_send(&mut server, &tick(2)).await;

    let err = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("loss should be reported")
        .expect("channel open");
    assert!(matches!(
        err,
        TransportError::HandlerPanicked { ref kind, ref reason } if kind == "Tick" && reason == "bad tick"
    ));
    assert!(conn.is_closed());

    drop(server);
    conn.close();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_close_is_idempotent_and_not_a_loss() {
    let (conn, _server) = pair();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    conn.set_on_loss(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    conn.close();
    conn.close();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(conn.is_closed());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(
        conn.send(&tick(1)),
        Err(TransportError::ConnectionClosed(_))
    ));
}

#[tokio::test]
async fn test_close_flushes_queued_frames() {
    let (conn, mut server) = pair();

    conn.send(&tick(1)).unwrap();
    conn.send(&tick(2)).unwrap();
    conn.close();

    assert_eq!(server_recv(&mut server).await, tick(1));
    assert_eq!(server_recv(&mut server).await, tick(2));
}

// =========================================================================
// join()
// =========================================================================

#[tokio::test]
async fn test_join_dials_tcp_listener() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });

    let conn = Connection::join(&addr, JsonCodec).await.expect("should connect");
    let mut server = accept.await.unwrap();

    conn.send(&tick(4)).unwrap();
    let payload = read_frame(&mut server).await.unwrap();
    let msg: Message = JsonCodec.decode(&payload).unwrap();
    assert_eq!(msg, tick(4));
    conn.close();
}

#[tokio::test]
async fn test_join_refused_is_connect_failed() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let result = Connection::join(&addr, JsonCodec).await;

    assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
}
