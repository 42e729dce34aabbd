//! Resume dispatch for a single blocked pane.
//!
//! The re-capture immediately before acting is the authoritative final
//! gate: whatever the wait believed, input is sent only if the pane still
//! shows the notice right now. Input goes to that pane only, never
//! broadcast.

use crate::detect::contains_rate_limit_notice;
use crate::tmux::MuxAdapter;

/// The literal continuation input sent to a blocked pane.
pub const CONTINUE_TEXT: &str = "continue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The continuation was dispatched.
    Resumed,
    /// The pane no longer shows the notice; nothing was sent.
    Skipped,
    /// The dispatch mechanism itself failed. Logged, never retried.
    Failed(String),
}

pub fn resume(adapter: &dyn MuxAdapter, pane_id: &str) -> ResumeOutcome {
    let text = match adapter.capture(pane_id) {
        Ok(text) => text,
        Err(err) => return ResumeOutcome::Failed(err.to_string()),
    };
    if !contains_rate_limit_notice(&text) {
        return ResumeOutcome::Skipped;
    }
    match adapter.send_text(pane_id, CONTINUE_TEXT) {
        Ok(()) => ResumeOutcome::Resumed,
        Err(err) => ResumeOutcome::Failed(err.to_string()),
    }
}
