//! ws-stream-bridge: entry point.
//!
//! This binary accepts WebSocket connections (typically from web browsers)
//! and bridges each one to its own TCP connection to a backend service that
//! only speaks a raw byte stream.  Payloads pass through unchanged.
//!
//! # Usage
//!
//! ```text
//! ws-stream-bridge [OPTIONS] [PORT]
//!
//! Arguments:
//!   [PORT]                      WebSocket listener port [default: 1338]
//!
//! Options:
//!   --listen-host <IP>          Address to bind [default: all interfaces]
//!   --backend-host <HOST>       Backend hostname or IP [default: 127.0.0.1]
//!   --backend-port <PORT>       Backend TCP port [default: 1337]
//!   --connect-timeout <SECS>    Backend connect timeout [default: 10]
//!   --read-buffer-size <BYTES>  Largest backend chunk per frame [default: 16384]
//!   --shutdown-grace <SECS>     Time allowed for bridges to close [default: 5]
//!   --config <FILE>             Optional TOML configuration file
//! ```
//!
//! # Environment variable overrides
//!
//! Precedence is command line, then environment, then config file, then the
//! built-in default.
//!
//! | Variable                    | Default     | Description                   |
//! |-----------------------------|-------------|-------------------------------|
//! | `WS_BRIDGE_PORT`            | `1338`      | WebSocket listener port       |
//! | `WS_BRIDGE_LISTEN_HOST`     | `0.0.0.0`   | Listener bind address         |
//! | `WS_BRIDGE_BACKEND_HOST`    | `127.0.0.1` | Backend host                  |
//! | `WS_BRIDGE_BACKEND_PORT`    | `1337`      | Backend port                  |
//! | `WS_BRIDGE_CONNECT_TIMEOUT` | `10`        | Backend connect timeout (s)   |
//! | `WS_BRIDGE_READ_BUFFER_SIZE`| `16384`     | Backend read chunk (bytes)    |
//! | `WS_BRIDGE_SHUTDOWN_GRACE`  | `5`         | Shutdown grace period (s)     |
//! | `WS_BRIDGE_CONFIG`          | (none)      | Path to a TOML config file    |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ws_stream_bridge::domain::config::{
    DEFAULT_BACKEND_HOST, DEFAULT_BACKEND_PORT, DEFAULT_LISTEN_PORT,
};
use ws_stream_bridge::domain::{BackendAddr, BridgeConfig, RelaySettings};
use ws_stream_bridge::infrastructure::config_file::{load_config, FileConfig};
use ws_stream_bridge::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebSocket to TCP stream bridge.
///
/// Every accepted WebSocket client gets its own connection to the backend;
/// when either side closes, the other side is closed too.
#[derive(Debug, Parser)]
#[command(
    name = "ws-stream-bridge",
    about = "Bridges WebSocket clients to a raw TCP stream service",
    version
)]
struct Cli {
    /// TCP port for the WebSocket listener.
    #[arg(value_name = "PORT", env = "WS_BRIDGE_PORT")]
    port: Option<u16>,

    /// IP address to bind the WebSocket listener to.
    ///
    /// Omit to accept connections on every interface.
    #[arg(long, env = "WS_BRIDGE_LISTEN_HOST")]
    listen_host: Option<String>,

    /// Hostname or IP address of the backend stream service.
    #[arg(long, env = "WS_BRIDGE_BACKEND_HOST")]
    backend_host: Option<String>,

    /// TCP port of the backend stream service.
    #[arg(long, env = "WS_BRIDGE_BACKEND_PORT")]
    backend_port: Option<u16>,

    /// Seconds to wait for the backend connection before giving up.
    #[arg(long, value_name = "SECS", env = "WS_BRIDGE_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// Largest chunk, in bytes, read from the backend per WebSocket frame.
    #[arg(long, value_name = "BYTES", env = "WS_BRIDGE_READ_BUFFER_SIZE")]
    read_buffer_size: Option<usize>,

    /// Seconds to wait for open bridges to close on shutdown.
    #[arg(long, value_name = "SECS", env = "WS_BRIDGE_SHUTDOWN_GRACE")]
    shutdown_grace: Option<u64>,

    /// Path to an optional TOML configuration file.
    #[arg(long, value_name = "FILE", env = "WS_BRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Loads the configuration file named by `--config`, if any.
    fn load_file_config(&self) -> anyhow::Result<FileConfig> {
        match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file '{}'", path.display())),
            None => Ok(FileConfig::default()),
        }
    }

    /// Merges the parsed arguments with `file` into a [`BridgeConfig`].
    ///
    /// Values given on the command line (or through the environment) win over
    /// the file; the file wins over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the listen host is not an IP address, or if the
    /// read buffer size or the pending limit is zero.
    fn into_bridge_config(self, file: FileConfig) -> anyhow::Result<BridgeConfig> {
        let listen_ip = match self.listen_host.or(file.listen.host) {
            Some(host) => host
                .parse::<IpAddr>()
                .with_context(|| format!("invalid listen host: '{host}'"))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let listen_port = self
            .port
            .or(file.listen.port)
            .unwrap_or(DEFAULT_LISTEN_PORT);

        let backend = BackendAddr::new(
            self.backend_host
                .or(file.backend.host)
                .unwrap_or_else(|| DEFAULT_BACKEND_HOST.to_string()),
            self.backend_port
                .or(file.backend.port)
                .unwrap_or(DEFAULT_BACKEND_PORT),
        );

        let defaults = RelaySettings::default();
        let relay = RelaySettings {
            connect_timeout: self
                .connect_timeout
                .or(file.relay.connect_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            read_buffer_size: self
                .read_buffer_size
                .or(file.relay.read_buffer_size)
                .unwrap_or(defaults.read_buffer_size),
            pending_limit: file
                .relay
                .pending_limit_bytes
                .unwrap_or(defaults.pending_limit),
        };
        anyhow::ensure!(
            relay.read_buffer_size > 0,
            "relay.read_buffer_size must be greater than zero"
        );
        // A zero budget would stop the client from being read (and its close
        // from being noticed) for the whole connect.
        anyhow::ensure!(
            relay.pending_limit > 0,
            "relay.pending_limit_bytes must be greater than zero"
        );

        let shutdown_grace = self
            .shutdown_grace
            .or(file.shutdown_grace_secs)
            .map(Duration::from_secs)
            .unwrap_or_else(|| BridgeConfig::default().shutdown_grace);

        Ok(BridgeConfig {
            listen_addr: SocketAddr::new(listen_ip, listen_port),
            backend,
            relay,
            shutdown_grace,
        })
    }
}

// ── Shutdown signals ──────────────────────────────────────────────────────────

/// Cancels `shutdown` on Ctrl+C, or on SIGTERM where available.
fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        res = tokio::signal::ctrl_c() => {
                            if let Err(e) = res {
                                error!("failed to listen for Ctrl+C signal: {e}");
                                return;
                            }
                            info!("received Ctrl+C; shutting down");
                        }
                        _ = sigterm.recv() => info!("received SIGTERM; shutting down"),
                    }
                    shutdown.cancel();
                    return;
                }
                Err(e) => error!("failed to install SIGTERM handler: {e}"),
            }
        }

        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                shutdown.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG` controls verbosity; fall back to `info`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let file = cli.load_file_config()?;
    let config = cli.into_bridge_config(file)?;

    info!(
        "ws-stream-bridge starting: listen={}, backend={}",
        config.listen_addr, config.backend
    );

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    run_server(config, shutdown).await?;

    info!("ws-stream-bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
