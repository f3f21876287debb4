//! Error taxonomy for bridge establishment and the listener.
//!
//! Failures *while* relaying are not errors at this level: a read or write
//! failure on either side is recorded as the bridge's [`CloseCause`] and
//! handled exactly like a close from that side.
//!
//! [`CloseCause`]: crate::domain::CloseCause

use std::net::SocketAddr;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::domain::BackendAddr;

/// Errors that end a bridge before it starts relaying, or stop the listener.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The outbound connect was refused, timed out, or the host did not
    /// resolve.  The client connection is closed; there is no retry.
    #[error("backend {addr} unreachable: {source}")]
    BackendUnreachable {
        addr: BackendAddr,
        #[source]
        source: std::io::Error,
    },

    /// The peer never completed the WebSocket upgrade.
    #[error("WebSocket handshake with {peer} failed: {source}")]
    Handshake {
        peer: SocketAddr,
        #[source]
        source: WsError,
    },

    /// The client went away while the backend connect was still in flight.
    #[error("client disconnected before the backend connection completed")]
    ClientGone,

    /// Process shutdown interrupted the bridge before it was established.
    #[error("bridge establishment interrupted by shutdown")]
    Shutdown,

    /// The local listen address could not be bound.  Fatal at startup.
    #[error("failed to bind WebSocket listener on {addr}: {source}")]
    ListenerBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_unreachable_message_names_address() {
        let err = BridgeError::BackendUnreachable {
            addr: BackendAddr::new("127.0.0.1", 1337),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        let text = err.to_string();
        assert!(text.contains("127.0.0.1:1337"), "got: {text}");
        assert!(text.contains("refused"), "got: {text}");
    }

    #[test]
    fn test_listener_bind_message_names_address() {
        let err = BridgeError::ListenerBind {
            addr: "0.0.0.0:1338".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:1338"));
    }

    #[test]
    fn test_source_is_preserved_for_error_chains() {
        use std::error::Error as _;
        let err = BridgeError::BackendUnreachable {
            addr: BackendAddr::default(),
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
        };
        assert!(err.source().is_some());
    }
}
