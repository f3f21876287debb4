//! Lifecycle coupling between the two ends of a bridge.
//!
//! A bridge has two endpoints and two forwarding directions.  Whichever
//! direction stops first decides *why* the bridge is closing; the other
//! direction only follows.  [`CloseLatch`] records that first decision with a
//! single compare-and-swap so concurrent close triggers from both directions
//! never race each other into conflicting states.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// One of the two endpoints of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEnd {
    /// The WebSocket client (framed transport).
    Client,
    /// The TCP backend (stream transport).
    Backend,
}

/// Why a bridge started tearing down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CloseCause {
    /// The client disconnected cleanly (Close frame or end of stream).
    ClientClosed = 1,
    /// Reading from or writing to the client failed.
    ClientFailed = 2,
    /// The backend closed its stream (EOF).
    BackendClosed = 3,
    /// Reading from or writing to the backend failed.
    BackendFailed = 4,
    /// The process is shutting down.
    Shutdown = 5,
}

impl CloseCause {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(CloseCause::ClientClosed),
            2 => Some(CloseCause::ClientFailed),
            3 => Some(CloseCause::BackendClosed),
            4 => Some(CloseCause::BackendFailed),
            5 => Some(CloseCause::Shutdown),
            _ => None,
        }
    }

    /// The endpoint that initiated the close, or `None` for a shutdown.
    pub fn initiator(self) -> Option<BridgeEnd> {
        match self {
            CloseCause::ClientClosed | CloseCause::ClientFailed => Some(BridgeEnd::Client),
            CloseCause::BackendClosed | CloseCause::BackendFailed => Some(BridgeEnd::Backend),
            CloseCause::Shutdown => None,
        }
    }

    /// Returns `true` when the close was caused by an I/O error.
    pub fn is_failure(self) -> bool {
        matches!(self, CloseCause::ClientFailed | CloseCause::BackendFailed)
    }
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseCause::ClientClosed => "client disconnected",
            CloseCause::ClientFailed => "client connection failed",
            CloseCause::BackendClosed => "connection to backend lost",
            CloseCause::BackendFailed => "backend connection failed",
            CloseCause::Shutdown => "shutdown",
        };
        f.write_str(text)
    }
}

const OPEN: u8 = 0;

/// A one-shot record of the first close trigger on a bridge.
///
/// `trigger` succeeds exactly once; every later call is a no-op that returns
/// `false`.  Shared between the two forwarding tasks via `Arc`.
#[derive(Debug, Default)]
pub struct CloseLatch {
    state: AtomicU8,
}

impl CloseLatch {
    /// Creates an open latch.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(OPEN),
        }
    }

    /// Records `cause` if the latch is still open.
    ///
    /// Returns `true` for the caller that actually closed the latch.
    pub fn trigger(&self, cause: CloseCause) -> bool {
        self.state
            .compare_exchange(OPEN, cause as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The cause recorded by the winning `trigger` call.
    pub fn cause(&self) -> Option<CloseCause> {
        CloseCause::from_u8(self.state.load(Ordering::Acquire))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
