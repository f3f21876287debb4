//! Domain layer for ws-stream-bridge.
//!
//! Pure types with no dependencies on I/O, networking, or async runtimes:
//!
//! - Configuration structures ([`BridgeConfig`], [`BackendAddr`], [`RelaySettings`])
//! - Close coupling state ([`CloseLatch`], [`CloseCause`])
//! - The pre-connect payload queue ([`PendingFrames`])

pub mod config;
pub mod lifecycle;
pub mod pending;

pub use config::{BackendAddr, BridgeConfig, RelaySettings};
pub use lifecycle::{BridgeEnd, CloseCause, CloseLatch};
pub use pending::PendingFrames;
