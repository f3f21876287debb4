//! End-to-end tests for the bridge over real loopback sockets.
//!
//! # Purpose
//!
//! Each test starts the accept loop on an ephemeral port, points it at a
//! backend `TcpListener` owned by the test, and drives a real WebSocket
//! client with `tokio_tungstenite::connect_async`.  They verify:
//!
//! - Request/response through the bridge (`PING` in, exactly one `PONG` out).
//! - Close coupling in both directions, and on process shutdown.
//! - Payload fidelity in both directions.
//! - An unreachable backend closes the client without payload.
//! - Bridges are isolated from each other.
//!
//! ```text
//! test client ──ws──► serve() ──tcp──► test backend listener
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;

use ws_stream_bridge::domain::{BackendAddr, BridgeConfig, RelaySettings};
use ws_stream_bridge::infrastructure::serve;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP: Duration = Duration::from_secs(5);

// ── Helpers ───────────────────────────────────────────────────────────────────

/// A running bridge server bound to an ephemeral loopback port.
struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start(backend: SocketAddr) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = BridgeConfig {
            listen_addr: addr,
            backend: BackendAddr::from(backend),
            relay: RelaySettings::default(),
            shutdown_grace: Duration::from_secs(2),
        };
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, config, shutdown.clone()));
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn connect(&self) -> Client {
        let (ws, _response) = timeout(STEP, connect_async(format!("ws://{}", self.addr)))
            .await
            .expect("handshake timed out")
            .expect("handshake failed");
        ws
    }

    async fn stop(self) {
        self.shutdown.cancel();
        timeout(STEP, self.handle)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

async fn backend_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn accept_backend(listener: &TcpListener) -> TcpStream {
    let (stream, _) = timeout(STEP, listener.accept())
        .await
        .expect("bridge never connected to the backend")
        .unwrap();
    stream
}

/// Reads the client until the bridge closes it; returns every data frame seen.
async fn data_frames_until_closed(client: &mut Client) -> Vec<Message> {
    let mut frames = Vec::new();
    loop {
        match timeout(STEP, client.next()).await.expect("client was never closed") {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return frames,
            Some(Ok(msg @ (Message::Binary(_) | Message::Text(_)))) => frames.push(msg),
            Some(Ok(_)) => {}
        }
    }
}

/// Reads the next data frame's payload from the client.
async fn next_payload(client: &mut Client) -> Vec<u8> {
    loop {
        match timeout(STEP, client.next()).await.expect("no frame arrived") {
            Some(Ok(Message::Binary(data))) => return data,
            Some(Ok(Message::Text(text))) => return text.into_bytes(),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            other => panic!("expected a data frame, got {other:?}"),
        }
    }
}

/// Asserts the backend sees EOF (or a reset) within [`STEP`].
async fn assert_backend_eof(backend: &mut TcpStream) {
    let mut buf = [0u8; 64];
    loop {
        match timeout(STEP, backend.read(&mut buf))
            .await
            .expect("backend was never closed")
        {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Backend that answers `PING` with `PONG`, echoes anything else, and hangs
/// up on `BYE`.  Serves every connection it accepts.
fn spawn_ping_backend(listener: TcpListener) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    let n = match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    let reply: &[u8] = match &buf[..n] {
                        b"PING" => b"PONG",
                        b"BYE" => return,
                        other => other,
                    };
                    if stream.write_all(reply).await.is_err() {
                        return;
                    }
                }
            });
        }
    })
}

// ── Request / response ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ping_yields_exactly_one_pong() {
    // Arrange
    let (listener, backend_addr) = backend_listener().await;
    let _backend = spawn_ping_backend(listener);
    let server = TestServer::start(backend_addr).await;
    let mut client = server.connect().await;

    // Act
    client.send(Message::binary(b"PING".to_vec())).await.unwrap();

    // Assert: one binary PONG and nothing after it
    assert_eq!(next_payload(&mut client).await, b"PONG");
    let extra = timeout(Duration::from_millis(200), client.next()).await;
    assert!(extra.is_err(), "unexpected extra frame: {extra:?}");

    server.stop().await;
}

#[tokio::test]
async fn test_text_frames_reach_backend_as_utf8_bytes() {
    let (listener, backend_addr) = backend_listener().await;
    let server = TestServer::start(backend_addr).await;
    let mut client = server.connect().await;
    let mut backend = accept_backend(&listener).await;

    client.send(Message::text("héllo")).await.unwrap();

    let mut buf = vec![0u8; "héllo".len()];
    timeout(STEP, backend.read_exact(&mut buf)).await.unwrap().unwrap();
    assert_eq!(buf, "héllo".as_bytes());

    server.stop().await;
}

#[tokio::test]
async fn test_messages_sent_right_after_handshake_arrive_in_order() {
    // Arrange: the client writes before the test has even accepted the
    // backend connection.
    let (listener, backend_addr) = backend_listener().await;
    let server = TestServer::start(backend_addr).await;
    let mut client = server.connect().await;

    // Act
    for part in [&b"one,"[..], b"two,", b"three"] {
        client.send(Message::binary(part.to_vec())).await.unwrap();
    }
    let mut backend = accept_backend(&listener).await;

    // Assert
    let mut buf = vec![0u8; b"one,two,three".len()];
    timeout(STEP, backend.read_exact(&mut buf)).await.unwrap().unwrap();
    assert_eq!(buf, b"one,two,three");

    server.stop().await;
}

// ── Close coupling ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_backend_close_closes_client_without_payload() {
    // Arrange
    let (listener, backend_addr) = backend_listener().await;
    let server = TestServer::start(backend_addr).await;
    let mut client = server.connect().await;

    // Act: the backend hangs up as soon as it accepts
    drop(accept_backend(&listener).await);

    // Assert
    let frames = data_frames_until_closed(&mut client).await;
    assert!(frames.is_empty(), "unexpected frames: {frames:?}");

    server.stop().await;
}

#[tokio::test]
async fn test_client_close_closes_backend() {
    let (listener, backend_addr) = backend_listener().await;
    let server = TestServer::start(backend_addr).await;
    let mut client = server.connect().await;
    let mut backend = accept_backend(&listener).await;

    client.close(None).await.unwrap();

    assert_backend_eof(&mut backend).await;
    server.stop().await;
}

#[tokio::test]
async fn test_client_dropping_tcp_closes_backend() {
    // No close handshake at all: the client's socket just disappears.
    let (listener, backend_addr) = backend_listener().await;
    let server = TestServer::start(backend_addr).await;
    let client = server.connect().await;
    let mut backend = accept_backend(&listener).await;

    drop(client);

    assert_backend_eof(&mut backend).await;
    server.stop().await;
}

#[tokio::test]
async fn test_unreachable_backend_closes_client_without_payload() {
    // Arrange: a port that was just released, so connects are refused
    let (listener, backend_addr) = backend_listener().await;
    drop(listener);
    let server = TestServer::start(backend_addr).await;

    // Act
    let mut client = server.connect().await;

    // Assert
    let frames = data_frames_until_closed(&mut client).await;
    assert!(frames.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_client_and_backend() {
    // Arrange
    let (listener, backend_addr) = backend_listener().await;
    let server = TestServer::start(backend_addr).await;
    let mut client = server.connect().await;
    let mut backend = accept_backend(&listener).await;

    // Act
    server.shutdown.cancel();

    // Assert
    let frames = data_frames_until_closed(&mut client).await;
    assert!(frames.is_empty());
    assert_backend_eof(&mut backend).await;
    timeout(STEP, server.handle).await.unwrap().unwrap();
}

// ── Fidelity ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_client_frames_reach_backend_verbatim_and_in_order() {
    // Arrange
    let (listener, backend_addr) = backend_listener().await;
    let server = TestServer::start(backend_addr).await;
    let mut client = server.connect().await;
    let mut backend = accept_backend(&listener).await;

    let frames: Vec<Vec<u8>> = (0..64u32)
        .map(|i| (0..(i * 37 % 500 + 1)).map(|b| (b ^ i) as u8).collect())
        .collect();
    let expected: Vec<u8> = frames.concat();

    // Act: write from a separate task while the backend drains
    let writer = tokio::spawn(async move {
        for frame in frames {
            client.send(Message::binary(frame)).await.unwrap();
        }
        client
    });

    // Assert
    let mut received = vec![0u8; expected.len()];
    timeout(STEP, backend.read_exact(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, expected);

    let _client = writer.await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_backend_bytes_reach_client_as_binary_frames() {
    // Arrange
    let (listener, backend_addr) = backend_listener().await;
    let server = TestServer::start(backend_addr).await;
    let mut client = server.connect().await;
    let mut backend = accept_backend(&listener).await;

    let expected: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();

    // Act
    let payload = expected.clone();
    tokio::spawn(async move {
        for chunk in payload.chunks(1500) {
            backend.write_all(chunk).await.unwrap();
        }
        backend
    });

    // Assert: chunk boundaries may differ, the byte stream may not
    let mut received = Vec::new();
    while received.len() < expected.len() {
        match timeout(STEP, client.next()).await.unwrap() {
            Some(Ok(Message::Binary(data))) => received.extend_from_slice(&data),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }
    assert_eq!(received, expected);

    server.stop().await;
}

// ── Isolation ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_closing_one_bridge_leaves_another_working() {
    // Arrange: two clients on the same server
    let (listener, backend_addr) = backend_listener().await;
    let _backend = spawn_ping_backend(listener);
    let server = TestServer::start(backend_addr).await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;

    assert_eq!(exchange(&mut first, b"PING").await, b"PONG");
    assert_eq!(exchange(&mut second, b"PING").await, b"PONG");

    // Act: the backend hangs up on the first bridge only
    first.send(Message::binary(b"BYE".to_vec())).await.unwrap();
    let frames = data_frames_until_closed(&mut first).await;
    assert!(frames.is_empty());

    // Assert
    assert_eq!(exchange(&mut second, b"PING").await, b"PONG");
    assert_eq!(exchange(&mut second, b"still here").await, b"still here");

    server.stop().await;
}

async fn exchange(client: &mut Client, payload: &[u8]) -> Vec<u8> {
    client.send(Message::binary(payload.to_vec())).await.unwrap();
    next_payload(client).await
}
