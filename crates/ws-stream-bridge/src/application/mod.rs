//! Application layer for ws-stream-bridge.
//!
//! Knows *what* the relay does with each unit of traffic and how failures are
//! classified, but delegates *how* (sockets, tasks, timers) to the
//! infrastructure layer.
//!
//! # Responsibilities
//!
//! - Deciding what each client WebSocket item means (payload, control, close)
//! - Framing backend chunks for the client
//! - Defining the `BridgeError` type for establishment and listener failures

pub mod error;
pub mod frame_policy;

pub use error::BridgeError;
pub use frame_policy::{
    backend_chunk_frame, classify_inbound, client_send_failure, InboundFrame,
};
