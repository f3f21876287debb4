//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup (CLI args, environment, optional TOML file,
//! defaults) and then treated as immutable for the lifetime of the process.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads inside the domain) lets tests point a bridge at a throwaway
//! backend on an ephemeral port.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Default TCP port the WebSocket listener binds to.
pub const DEFAULT_LISTEN_PORT: u16 = 1338;
/// Default backend host.
pub const DEFAULT_BACKEND_HOST: &str = "127.0.0.1";
/// Default backend port.
pub const DEFAULT_BACKEND_PORT: u16 = 1337;

/// Address of the stream service every bridge connects to.
///
/// `host` is kept as a string rather than an `IpAddr` so that DNS names are
/// accepted; resolution happens on every outbound connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddr {
    /// Hostname or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl BackendAddr {
    /// Creates a backend address from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for BackendAddr {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_HOST, DEFAULT_BACKEND_PORT)
    }
}

impl From<SocketAddr> for BackendAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // IPv6 literals need brackets to stay unambiguous next to the port.
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Per-bridge relay tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Upper bound on the outbound TCP connect (including DNS resolution).
    pub connect_timeout: Duration,

    /// Size of the buffer used for each backend read.  Every successful read
    /// becomes one WebSocket frame, so this is also the largest frame the
    /// bridge will emit towards the client.
    pub read_buffer_size: usize,

    /// Byte budget for client frames received while the backend connect is
    /// still in flight.  Once reached, the bridge stops reading the client
    /// until the connect completes.
    pub pending_limit: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_buffer_size: 16 * 1024,
            pending_limit: 256 * 1024,
        }
    }
}

/// All runtime configuration for the bridge process.
///
/// # Example
///
/// ```rust
/// use ws_stream_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.listen_addr.port(), 1338);
/// assert_eq!(cfg.backend.to_string(), "127.0.0.1:1337");
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The address and port the WebSocket listener binds to.
    ///
    /// An unspecified IP (`0.0.0.0`) accepts connections on every interface.
    pub listen_addr: SocketAddr,

    /// The stream service every accepted client is bridged to.
    pub backend: BackendAddr,

    /// Per-bridge relay settings.
    pub relay: RelaySettings,

    /// How long shutdown waits for live bridges to finish closing.
    pub shutdown_grace: Duration,
}

impl Default for BridgeConfig {
    /// | Field           | Default           |
    /// |-----------------|-------------------|
    /// | listen_addr     | `0.0.0.0:1338`    |
    /// | backend         | `127.0.0.1:1337`  |
    /// | relay           | see [`RelaySettings`] |
    /// | shutdown_grace  | 5 seconds         |
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
            backend: BackendAddr::default(),
            relay: RelaySettings::default(),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
