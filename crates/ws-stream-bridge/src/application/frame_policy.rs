//! Forwarding policy between WebSocket frames and raw stream bytes.
//!
//! Pure functions with no I/O side effects.  They decide what each item read
//! from the client means for the relay, and how each chunk read from the
//! backend is framed for the client.  Payload bytes are never inspected.
//!
//! # Translation directions
//!
//! ```text
//! Client → Backend:  WebSocket item  → InboundFrame (payload bytes / control / close)
//!                    call: classify_inbound()
//!
//! Backend → Client:  one read chunk  → one binary WebSocket frame
//!                    call: backend_chunk_frame()
//! ```

use tokio_tungstenite::tungstenite::{error::ProtocolError, Error as WsError, Message as WsMessage};

use crate::domain::CloseCause;

/// What a single item read from the client means for the relay.
#[derive(Debug)]
pub enum InboundFrame {
    /// Bytes to forward verbatim to the backend.
    Payload(Vec<u8>),
    /// A control frame (ping/pong/raw) handled by the WebSocket layer itself.
    Control,
    /// The client ended the session cleanly.
    Closed,
    /// Reading from the client failed.
    Failed(WsError),
}

/// Classifies the next item of the client's WebSocket stream.
///
/// - Binary frames are forwarded as-is.
/// - Text frames are forwarded as their UTF-8 bytes; no other meaning is
///   attached to them.
/// - Ping and pong are answered by tungstenite and never reach the backend.
/// - A Close frame, the end of the stream, or an abrupt TCP reset from the
///   client all count as a clean disconnect.
pub fn classify_inbound(item: Option<Result<WsMessage, WsError>>) -> InboundFrame {
    match item {
        Some(Ok(WsMessage::Binary(data))) => InboundFrame::Payload(data),
        Some(Ok(WsMessage::Text(text))) => InboundFrame::Payload(text.into_bytes()),
        Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {
            InboundFrame::Control
        }
        Some(Ok(WsMessage::Close(_))) | None => InboundFrame::Closed,
        Some(Err(
            WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake),
        )) => InboundFrame::Closed,
        Some(Err(e)) => InboundFrame::Failed(e),
    }
}

/// Wraps one chunk read from the backend as one binary frame for the client.
///
/// Chunk boundaries are whatever the TCP read returned; no attempt is made to
/// reconstruct the backend's own message framing.
pub fn backend_chunk_frame(chunk: &[u8]) -> WsMessage {
    WsMessage::Binary(chunk.to_vec())
}

/// Classifies a failed send towards the client.
///
/// A send that fails because the client already closed (or reset) its side is
/// a disconnect, not a fault of the relay.
pub fn client_send_failure(err: &WsError) -> CloseCause {
    match err {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(
            ProtocolError::SendAfterClosing | ProtocolError::ResetWithoutClosingHandshake,
        ) => CloseCause::ClientClosed,
        _ => CloseCause::ClientFailed,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
