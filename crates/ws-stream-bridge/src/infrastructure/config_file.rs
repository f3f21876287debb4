//! Optional TOML configuration file.
//!
//! Every key is optional; anything missing falls back to the command line,
//! the environment, or the built-in defaults (in that order, see `main.rs`).
//!
//! ```toml
//! shutdown_grace_secs = 5
//!
//! [listen]
//! host = "127.0.0.1"
//! port = 1338
//!
//! [backend]
//! host = "127.0.0.1"
//! port = 1337
//!
//! [relay]
//! connect_timeout_secs = 10
//! read_buffer_size = 16384
//! pending_limit_bytes = 262144
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration file schema.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub listen: ListenSection,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub relay: RelaySection,
    /// Seconds to wait for bridges to close on shutdown.
    pub shutdown_grace_secs: Option<u64>,
}

/// `[listen]`: where the WebSocket listener binds.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ListenSection {
    /// IP address to bind.  Omit to listen on all interfaces.
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// `[backend]`: the stream service to bridge to.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// `[relay]`: per-bridge tuning.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    pub connect_timeout_secs: Option<u64>,
    pub read_buffer_size: Option<usize>,
    pub pending_limit_bytes: Option<usize>,
}

/// Parses configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for invalid TOML, wrong value types, or
/// unknown keys.
pub fn parse_config(text: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, or
/// [`ConfigError::Parse`] if its contents are invalid.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
