//! Typed errors that callers branch on.
//!
//! Everything else travels as `anyhow::Error`.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading `mcp.json`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config in {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no servers configured under \"mcpServers\"")]
    NoServers,
}

/// Rejected input in the interactive selector.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Enter a number")]
    NotANumber,

    #[error("Invalid number")]
    OutOfRange { index: i64, count: usize },
}
