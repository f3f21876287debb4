//! ws-stream-bridge library crate.
//!
//! Bridges WebSocket clients (which cannot open raw TCP sockets, e.g. web
//! browsers) to a backend service that only speaks a plain byte stream.
//! Every accepted WebSocket gets its own outbound TCP connection; payloads
//! pass through unmodified in both directions and the two connections'
//! lifetimes are coupled.
//!
//! # Architecture
//!
//! ```text
//! Client (WebSocket frames)
//!         ↕
//! [ws-stream-bridge]
//!   ├── domain/           Pure types: BridgeConfig, CloseLatch, PendingFrames
//!   ├── application/      Frame policy, BridgeError
//!   └── infrastructure/
//!         ├── ws_server/    WebSocket accept loop (tokio-tungstenite)
//!         ├── bridge/       Per-client relay tasks and close coupling
//!         ├── backend_conn/ TCP connection to the backend
//!         └── config_file/  Optional TOML configuration
//!         ↕
//! Backend (raw TCP byte stream)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and the WebSocket message types only.
//! - `infrastructure` depends on all other layers plus `tokio`.

/// Domain layer: configuration and lifecycle types (no I/O).
pub mod domain;

/// Application layer: frame policy and error taxonomy.
pub mod application;

/// Infrastructure layer: WebSocket server, bridge runtime, backend connection.
pub mod infrastructure;
