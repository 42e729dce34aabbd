//! Error types for reclaim-core operations.
//!
//! The daemon's propagation policy branches on error class: transient
//! failures skip the poll cycle, parse failures skip a single pane, and
//! only configuration errors are allowed to abort startup.

use std::path::PathBuf;

/// All errors that can occur in reclaim-core operations.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors (fatal at startup only)
    // ─────────────────────────────────────────────────────────────────────
    #[error("Credentials file not found at {0}")]
    CredentialsNotFound(PathBuf),

    #[error("Credentials file malformed: {path}: {details}")]
    CredentialsMalformed { path: PathBuf, details: String },

    #[error("tmux not available or no server running")]
    TmuxUnavailable,

    // ─────────────────────────────────────────────────────────────────────
    // Transient Errors (skip the cycle, retry next poll)
    // ─────────────────────────────────────────────────────────────────────
    #[error("Usage API request failed: {0}")]
    UsageRequest(#[from] reqwest::Error),

    #[error("Usage API returned HTTP {status}")]
    UsageStatus { status: u16 },

    #[error("Usage API response malformed: {0}")]
    UsageDecode(String),

    // ─────────────────────────────────────────────────────────────────────
    // Per-Pane Errors (skip the pane, retry on next detection)
    // ─────────────────────────────────────────────────────────────────────
    #[error("Unrecognized reset time expression: {0:?}")]
    UnparsableReset(String),

    // ─────────────────────────────────────────────────────────────────────
    // Dispatch Errors (logged, wait dropped, no retry)
    // ─────────────────────────────────────────────────────────────────────
    #[error("tmux command failed: {command}: {details}")]
    TmuxCommand { command: String, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl WatchError {
    /// Transient errors must never cancel in-progress waits; the daemon
    /// skips the cycle and retries on the next poll.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WatchError::UsageRequest(_)
                | WatchError::UsageStatus { .. }
                | WatchError::UsageDecode(_)
        )
    }
}

/// Convenience type alias for Results using WatchError.
pub type Result<T> = std::result::Result<T, WatchError>;

// Conversion for string error compatibility
impl From<WatchError> for String {
    fn from(err: WatchError) -> String {
        err.to_string()
    }
}
