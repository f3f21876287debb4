//! TCP connection to the backend stream service.
//!
//! Each bridge gets its own TCP connection to the backend.  The backend sees
//! an ordinary stream client and never learns that a WebSocket sits on the
//! other side.
//!
//! # Portability note
//!
//! Uses only `tokio::net::TcpStream`, which behaves identically on Windows,
//! Linux, and macOS.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::application::BridgeError;
use crate::domain::BackendAddr;

/// Opens a TCP connection to the backend at `addr`.
///
/// The whole attempt (DNS resolution plus TCP handshake) is bounded by
/// `connect_timeout`.  `TCP_NODELAY` is enabled so small interactive writes
/// are not held back by Nagle's algorithm.
///
/// # Errors
///
/// Returns [`BridgeError::BackendUnreachable`] if the host does not resolve,
/// the connection is refused, or the timeout expires.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ws_stream_bridge::domain::BackendAddr;
/// use ws_stream_bridge::infrastructure::backend_conn::connect_backend;
///
/// # async fn example() -> Result<(), ws_stream_bridge::application::BridgeError> {
/// let addr = BackendAddr::new("127.0.0.1", 1337);
/// let stream = connect_backend(&addr, Duration::from_secs(10)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect_backend(
    addr: &BackendAddr,
    connect_timeout: Duration,
) -> Result<TcpStream, BridgeError> {
    let attempt = TcpStream::connect((addr.host.as_str(), addr.port));
    let stream = connect_within(addr, connect_timeout, attempt).await?;

    if let Err(e) = stream.set_nodelay(true) {
        debug!("backend {addr}: could not enable TCP_NODELAY: {e}");
    }

    Ok(stream)
}

/// Bounds a connect `attempt` to `addr` by `connect_timeout`.
///
/// An I/O error from the attempt and an expired timeout both become
/// [`BridgeError::BackendUnreachable`]; the timeout carries
/// [`io::ErrorKind::TimedOut`].
pub async fn connect_within<T, F>(
    addr: &BackendAddr,
    connect_timeout: Duration,
    attempt: F,
) -> Result<T, BridgeError>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(connect_timeout, attempt).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(BridgeError::BackendUnreachable {
            addr: addr.clone(),
            source,
        }),
        Err(_) => Err(BridgeError::BackendUnreachable {
            addr: addr.clone(),
            source: io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {connect_timeout:?}"),
            ),
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
