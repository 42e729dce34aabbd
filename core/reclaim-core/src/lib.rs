//! Core engine for reclaim: detects rate-limited Claude Code sessions in
//! tmux panes and resumes them automatically once the limit resets.
//!
//! The pipeline each poll cycle is: fetch the account usage snapshot, scan
//! assistant panes, reconcile existing waits against what the panes show
//! now, run dual-signal detection, and schedule one cancellable wait per
//! newly blocked pane. A completing wait re-checks its pane before sending
//! the continuation.

pub mod config;
pub mod daemon;
pub mod detect;
pub mod error;
pub mod format;
pub mod patterns;
pub mod resume;
pub mod timeparse;
pub mod tmux;
pub mod usage;
pub mod waiter;

pub use config::Config;
pub use daemon::{Daemon, DaemonState, Phase};
pub use detect::{detect, BlockedPane, ResetNotice};
pub use error::{Result, WatchError};
pub use resume::{resume, ResumeOutcome};
pub use tmux::{CommandMuxAdapter, MuxAdapter, Pane, PaneScanner};
pub use usage::{UsageClient, UsageSnapshot, UsageSource, UsageWindow, WindowId};
pub use waiter::{CancelReason, WaitOutcome};
