//! Infrastructure layer for ws-stream-bridge.
//!
//! Handles all I/O: accepting WebSocket connections, opening TCP connections
//! to the backend, running the per-bridge relay tasks, and reading the
//! optional configuration file.
//!
//! # What does NOT belong here?
//!
//! - Frame classification (that is the application layer)
//! - Configuration and lifecycle types (that is the domain layer)
//! - Command-line parsing (that is done in `main.rs`)

pub mod backend_conn;
pub mod bridge;
pub mod config_file;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use bridge::{establish, Bridge, BridgeOutcome, DirectionStats};
pub use ws_server::{run_server, serve};
