//! Bounded queue for client payloads that arrive before the backend is ready.
//!
//! The outbound connect is asynchronous, and a client may start sending as
//! soon as its WebSocket handshake completes.  Those early payloads are held
//! here, in arrival order, and written to the backend before live forwarding
//! starts.
//!
//! The queue never rejects a payload.  Instead it reports [`is_full`] once the
//! byte budget is reached, and the caller stops reading the client until the
//! connect completes.  That keeps memory bounded without dropping anything.
//!
//! [`is_full`]: PendingFrames::is_full

use std::collections::VecDeque;

/// Client payloads buffered during the backend connect.
#[derive(Debug)]
pub struct PendingFrames {
    frames: VecDeque<Vec<u8>>,
    buffered: usize,
    limit: usize,
}

impl PendingFrames {
    /// Creates an empty queue with a byte budget of `limit`.
    pub fn new(limit: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            buffered: 0,
            limit,
        }
    }

    /// Appends one payload.  Always succeeds, even past the budget.
    pub fn push(&mut self, payload: Vec<u8>) {
        self.buffered += payload.len();
        self.frames.push_back(payload);
    }

    /// Returns `true` when the caller should stop reading more payloads.
    pub fn is_full(&self) -> bool {
        self.buffered >= self.limit
    }

    /// Number of buffered payloads.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total bytes across all buffered payloads.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    /// Removes and returns the oldest payload.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        let payload = self.frames.pop_front()?;
        self.buffered -= payload.len();
        Some(payload)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
