//! One bridge: a WebSocket client coupled to one backend TCP connection.
//!
//! [`establish`] opens the outbound connection for an already-upgraded
//! client.  [`Bridge::run`] then relays in both directions until either side
//! ends, and closes the other side.
//!
//! # Close coupling
//!
//! ```text
//!              ┌──────── client→backend task ────────┐
//! client rx ──►│ classify frame, write bytes         │──► backend tx  (closed here)
//!              └─────────────────────────────────────┘
//!              ┌──────── backend→client task ────────┐
//! backend rx ─►│ read chunk, send one binary frame   │──► client tx   (closed here)
//!              └─────────────────────────────────────┘
//!                      shared: CloseLatch + stop token
//! ```
//!
//! Each task owns the write side of exactly one endpoint, so each endpoint is
//! closed by exactly one task.  The first task to stop records its cause in
//! the [`CloseLatch`] and cancels the bridge's stop token; the other task then
//! stops reading (late data is discarded) and closes its own endpoint.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::{
    backend_chunk_frame, classify_inbound, client_send_failure, BridgeError, InboundFrame,
};
use crate::domain::{BackendAddr, BridgeEnd, CloseCause, CloseLatch, PendingFrames, RelaySettings};
use crate::infrastructure::backend_conn::connect_backend;

/// Upper bound on sending our Close frame to a client that stopped reading.
const CLIENT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Traffic counters for one forwarding direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionStats {
    /// Payload units forwarded (WebSocket frames or backend writes).
    pub frames: u64,
    /// Payload bytes forwarded.
    pub bytes: u64,
}

impl DirectionStats {
    fn record(&mut self, bytes: usize) {
        self.frames += 1;
        self.bytes += bytes as u64;
    }
}

/// How a bridge ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOutcome {
    /// The first close trigger observed on the bridge.
    pub cause: CloseCause,
    /// Client → backend traffic.
    pub to_backend: DirectionStats,
    /// Backend → client traffic.
    pub to_client: DirectionStats,
}

/// A client paired with its backend connection, ready to relay.
pub struct Bridge<S, B> {
    id: Uuid,
    client: WebSocketStream<S>,
    backend: B,
    pending: PendingFrames,
    read_buffer_size: usize,
    stop: CancellationToken,
}

/// Connects `client` to the backend at `backend`.
///
/// Client frames that arrive while the connect is in flight are buffered and
/// delivered first once the bridge runs.  On any failure the client is sent a
/// Close frame before the error is returned; no outbound socket survives.
///
/// `shutdown` is the process-wide stop signal; the bridge derives its own
/// child token from it, so closing one bridge never affects another.
///
/// # Errors
///
/// - [`BridgeError::BackendUnreachable`] if the connect fails or times out.
/// - [`BridgeError::ClientGone`] if the client disconnects first.
/// - [`BridgeError::Shutdown`] if `shutdown` is cancelled first.
pub async fn establish<S>(
    id: Uuid,
    client: WebSocketStream<S>,
    backend: &BackendAddr,
    settings: &RelaySettings,
    shutdown: &CancellationToken,
) -> Result<Bridge<S, TcpStream>, BridgeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let connect = connect_backend(backend, settings.connect_timeout);
    establish_with(id, client, connect, settings, shutdown).await
}

/// Same as [`establish`], with the outbound connect supplied by the caller.
///
/// Lets tests substitute an in-memory stream or a deliberately slow connect.
pub async fn establish_with<S, B, F>(
    id: Uuid,
    mut client: WebSocketStream<S>,
    connect: F,
    settings: &RelaySettings,
    shutdown: &CancellationToken,
) -> Result<Bridge<S, B>, BridgeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Future<Output = Result<B, BridgeError>>,
{
    let mut pending = PendingFrames::new(settings.pending_limit);

    // The connect future lives only inside this block, so an abandoned
    // attempt is dropped before the client is closed.
    let result = {
        tokio::pin!(connect);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Err(BridgeError::Shutdown),
                connected = &mut connect => break connected,
                item = client.next(), if !pending.is_full() => match classify_inbound(item) {
                    InboundFrame::Payload(bytes) => {
                        pending.push(bytes);
                        debug!(
                            "bridge {id}: {} bytes buffered before backend connect",
                            pending.buffered_bytes()
                        );
                    }
                    InboundFrame::Control => {}
                    InboundFrame::Closed => break Err(BridgeError::ClientGone),
                    InboundFrame::Failed(e) => {
                        debug!("bridge {id}: client read failed during connect: {e}");
                        break Err(BridgeError::ClientGone);
                    }
                },
            }
        }
    };

    match result {
        Ok(backend) => Ok(Bridge {
            id,
            client,
            backend,
            pending,
            read_buffer_size: settings.read_buffer_size.max(1),
            stop: shutdown.child_token(),
        }),
        Err(e) => {
            close_client(id, &mut client).await;
            Err(e)
        }
    }
}

impl<S, B> Bridge<S, B>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Number of client frames buffered while the backend was connecting.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Relays in both directions until the bridge terminates.
    ///
    /// Returns once both endpoints are closed.  Never fails: I/O errors on
    /// either side end the bridge and are reported in the outcome's cause.
    pub async fn run(self) -> BridgeOutcome {
        let Bridge {
            id,
            client,
            backend,
            pending,
            read_buffer_size,
            stop,
        } = self;

        let (client_tx, client_rx) = client.split();
        let (backend_rx, backend_tx) = tokio::io::split(backend);
        let latch = Arc::new(CloseLatch::new());

        let upstream = tokio::spawn({
            let latch = Arc::clone(&latch);
            let stop = stop.clone();
            async move {
                // A panicking task must still release its peer.
                let _guard = stop.clone().drop_guard();
                pump_client_to_backend(id, client_rx, backend_tx, pending, &latch, &stop).await
            }
        });

        let downstream = tokio::spawn({
            let latch = Arc::clone(&latch);
            let stop = stop.clone();
            async move {
                let _guard = stop.clone().drop_guard();
                pump_backend_to_client(id, backend_rx, client_tx, read_buffer_size, &latch, &stop)
                    .await
            }
        });

        let (upstream, downstream) = tokio::join!(upstream, downstream);
        let to_backend = upstream.unwrap_or_else(|e| {
            warn!("bridge {id}: client→backend task failed: {e}");
            DirectionStats::default()
        });
        let to_client = downstream.unwrap_or_else(|e| {
            warn!("bridge {id}: backend→client task failed: {e}");
            DirectionStats::default()
        });

        // A task that panicked before recording anything leaves the latch open.
        let cause = latch.cause().unwrap_or(CloseCause::Shutdown);

        info!(
            "bridge {id}: {cause} ({} bytes in {} frames to backend, {} bytes in {} frames to client)",
            to_backend.bytes, to_backend.frames, to_client.bytes, to_client.frames
        );

        BridgeOutcome {
            cause,
            to_backend,
            to_client,
        }
    }
}

// ── Forwarding tasks ──────────────────────────────────────────────────────────

/// Client → backend.  Owns the backend's write side and closes it on exit.
pub(crate) async fn pump_client_to_backend<R, W>(
    id: Uuid,
    mut client_rx: R,
    mut backend_tx: W,
    mut pending: PendingFrames,
    latch: &CloseLatch,
    stop: &CancellationToken,
) -> DirectionStats
where
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = DirectionStats::default();

    let cause = 'relay: {
        // Frames received during the connect go out first, in arrival order.
        while let Some(payload) = pending.pop() {
            match write_to_backend(&mut backend_tx, &payload, stop).await {
                None => break 'relay None,
                Some(Ok(())) => stats.record(payload.len()),
                Some(Err(e)) => {
                    warn!("bridge {id}: write to backend failed: {e}");
                    break 'relay Some(CloseCause::BackendFailed);
                }
            }
        }

        loop {
            let item = tokio::select! {
                biased;
                _ = stop.cancelled() => break None,
                item = client_rx.next() => item,
            };

            match classify_inbound(item) {
                InboundFrame::Payload(payload) => {
                    match write_to_backend(&mut backend_tx, &payload, stop).await {
                        None => break None,
                        Some(Ok(())) => stats.record(payload.len()),
                        Some(Err(e)) => {
                            warn!("bridge {id}: write to backend failed: {e}");
                            break Some(CloseCause::BackendFailed);
                        }
                    }
                }
                InboundFrame::Control => {}
                InboundFrame::Closed => break Some(CloseCause::ClientClosed),
                InboundFrame::Failed(e) => {
                    warn!("bridge {id}: client WebSocket error: {e}");
                    break Some(CloseCause::ClientFailed);
                }
            }
        }
    };

    finish_direction(id, cause, latch, stop);

    if let Err(e) = backend_tx.shutdown().await {
        debug!("bridge {id}: backend shutdown: {e}");
    }

    stats
}

/// Backend → client.  Owns the client's write side and closes it on exit.
pub(crate) async fn pump_backend_to_client<R, W>(
    id: Uuid,
    mut backend_rx: R,
    mut client_tx: W,
    read_buffer_size: usize,
    latch: &CloseLatch,
    stop: &CancellationToken,
) -> DirectionStats
where
    R: AsyncRead + Unpin,
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    let mut stats = DirectionStats::default();
    let mut buf = vec![0u8; read_buffer_size.max(1)];

    let cause = loop {
        let read = tokio::select! {
            biased;
            _ = stop.cancelled() => break None,
            read = backend_rx.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => break Some(CloseCause::BackendClosed),
            Ok(n) => n,
            Err(e) => {
                warn!("bridge {id}: read from backend failed: {e}");
                break Some(CloseCause::BackendFailed);
            }
        };

        // `send` waits for the frame to be flushed, which is what pushes
        // back on the backend when the client reads slowly.
        let sent = tokio::select! {
            biased;
            _ = stop.cancelled() => break None,
            sent = client_tx.send(backend_chunk_frame(&buf[..n])) => sent,
        };

        match sent {
            Ok(()) => stats.record(n),
            Err(e) => {
                let cause = client_send_failure(&e);
                if cause.is_failure() {
                    warn!("bridge {id}: WebSocket send failed: {e}");
                } else {
                    debug!("bridge {id}: WebSocket send after client close: {e}");
                }
                break Some(cause);
            }
        }
    };

    finish_direction(id, cause, latch, stop);
    close_client(id, &mut client_tx).await;

    stats
}

/// Writes one payload, giving up if the bridge is stopped meanwhile.
///
/// Returns `None` when stopped; the partially written payload is discarded
/// along with the rest of the bridge.
async fn write_to_backend<W>(
    backend_tx: &mut W,
    payload: &[u8],
    stop: &CancellationToken,
) -> Option<io::Result<()>>
where
    W: AsyncWrite + Unpin,
{
    tokio::select! {
        biased;
        _ = stop.cancelled() => None,
        written = async {
            backend_tx.write_all(payload).await?;
            backend_tx.flush().await
        } => Some(written),
    }
}

/// Records why this direction stopped and releases the other direction.
///
/// `cause` is `None` when the direction was stopped from outside; if nothing
/// else has claimed the latch by then, the stop came from shutdown.
fn finish_direction(
    id: Uuid,
    cause: Option<CloseCause>,
    latch: &CloseLatch,
    stop: &CancellationToken,
) {
    let cause = cause.unwrap_or(CloseCause::Shutdown);
    if latch.trigger(cause) {
        match cause.initiator() {
            Some(BridgeEnd::Client) => debug!("bridge {id}: {cause}; closing backend"),
            Some(BridgeEnd::Backend) => debug!("bridge {id}: {cause}; closing client"),
            None => debug!("bridge {id}: {cause}; closing both ends"),
        }
    }
    stop.cancel();
}

/// Sends a Close frame to the client.  Closing an already-closed client is a
/// no-op; any error here is only logged.
async fn close_client<W>(id: Uuid, client_tx: &mut W)
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
{
    match timeout(CLIENT_CLOSE_TIMEOUT, client_tx.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("bridge {id}: client close: {e}"),
        Err(_) => debug!("bridge {id}: client did not accept Close frame in time"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
