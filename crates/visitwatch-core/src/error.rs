//! Error taxonomy shared across the workspace.

use thiserror::Error;

/// Errors surfaced by the VisitWatch core and engine.
///
/// One user's error never crosses a user boundary: callers that iterate
/// users convert these into per-user outcomes and keep going.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Snapshot, registry, settings, or queue state could not be read.
    #[error("state read failed: {0}")]
    StateRead(String),

    /// A rotated snapshot or updated digest queue could not be persisted.
    /// The previous on-disk state remains authoritative.
    #[error("state write failed: {0}")]
    StateWrite(String),

    /// The notification gateway reported failure for one or more channels.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// App configuration is missing or malformed.
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;
