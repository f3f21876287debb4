//! WebSocket server: accept loop and per-bridge task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from clients.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Establishing a bridge to the backend for every session.
//! 5. Stopping on shutdown: no new accepts, every live bridge closed, then a
//!    bounded wait for bridges to finish.
//!
//! # Scalability
//!
//! Each bridge runs in its own Tokio task.  The accept loop never waits on a
//! bridge: it accepts a connection and immediately spawns a task for it, so a
//! slow handshake or an unreachable backend never delays other clients.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Error as WsError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::BridgeError;
use crate::domain::BridgeConfig;
use crate::infrastructure::bridge::establish;

/// Upper bound on the WebSocket upgrade of a freshly accepted connection.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the listen address and serves until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns [`BridgeError::ListenerBind`] if the listen address cannot be bound
/// (port in use, permission denied).  Nothing else stops the server early.
pub async fn run_server(config: BridgeConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|source| BridgeError::ListenerBind {
            addr: config.listen_addr,
            source,
        })?;

    serve(listener, config, shutdown).await;
    Ok(())
}

/// Runs the accept loop on an already-bound listener.
///
/// Split from [`run_server`] so tests can bind port 0 and learn the address.
pub async fn serve(listener: TcpListener, config: BridgeConfig, shutdown: CancellationToken) {
    match listener.local_addr() {
        Ok(addr) => info!(
            "listening for WebSocket clients on {addr}, bridging to {}",
            config.backend
        ),
        Err(e) => warn!("listener ready (local address unavailable: {e})"),
    }

    let config = Arc::new(config);
    let bridges = TaskTracker::new();

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested; stopping accept loop");
                break;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer_addr)) => {
                let cfg = Arc::clone(&config);
                let shutdown = shutdown.clone();
                bridges.spawn(async move {
                    handle_client(stream, peer_addr, cfg, shutdown).await;
                });
            }
            Err(e) => {
                // Transient accept error (e.g., too many open file descriptors).
                // Log it and continue rather than crashing the whole bridge.
                error!("accept error: {e}");
            }
        }
    }

    // Live bridges hold child tokens of `shutdown`, so they are already
    // closing both of their endpoints.
    bridges.close();
    if !bridges.is_empty() {
        info!("waiting for {} bridge(s) to close", bridges.len());
    }
    if timeout(config.shutdown_grace, bridges.wait()).await.is_err() {
        warn!(
            "{} bridge(s) still open after {:?}; exiting anyway",
            bridges.len(),
            config.shutdown_grace
        );
    }
}

// ── Per-client handler ────────────────────────────────────────────────────────

/// Top-level handler for a single client connection.
///
/// Wraps [`run_bridge`] and logs the outcome.  A failure here only ever ends
/// this one client's bridge.
async fn handle_client(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<BridgeConfig>,
    shutdown: CancellationToken,
) {
    let id = Uuid::new_v4();
    if let Err(e) = run_bridge(id, raw_stream, peer_addr, &config, &shutdown).await {
        match e {
            BridgeError::ClientGone | BridgeError::Shutdown => {
                info!("bridge {id}: client {peer_addr}: {e}");
            }
            _ => warn!("bridge {id}: client {peer_addr}: {e}"),
        }
    }
}

/// Upgrades the connection, establishes the bridge and relays until it ends.
async fn run_bridge(
    id: Uuid,
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: &BridgeConfig,
    shutdown: &CancellationToken,
) -> Result<(), BridgeError> {
    if let Err(e) = raw_stream.set_nodelay(true) {
        warn!("bridge {id}: could not enable TCP_NODELAY for {peer_addr}: {e}");
    }

    let ws_stream = tokio::select! {
        biased;
        _ = shutdown.cancelled() => return Err(BridgeError::Shutdown),
        upgraded = timeout(HANDSHAKE_TIMEOUT, accept_async(raw_stream)) => match upgraded {
            Ok(result) => result.map_err(|source| BridgeError::Handshake {
                peer: peer_addr,
                source,
            })?,
            Err(_) => {
                return Err(BridgeError::Handshake {
                    peer: peer_addr,
                    source: WsError::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no WebSocket upgrade within {HANDSHAKE_TIMEOUT:?}"),
                    )),
                })
            }
        },
    };

    info!("bridge {id}: client {peer_addr} connected");

    let bridge = establish(id, ws_stream, &config.backend, &config.relay, shutdown).await?;

    info!("bridge {id}: connected to backend {}", config.backend);

    bridge.run().await;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
