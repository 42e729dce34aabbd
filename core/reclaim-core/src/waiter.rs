//! Cancellable per-pane wait until a resolved reset time.
//!
//! Each wait runs on its own thread; the cancellation channel doubles as
//! the interruptible sleep, so a pane that recovers early wakes its waiter
//! immediately instead of sleeping out the full interval.

use crate::format::format_duration;
use chrono::{DateTime, Utc};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// Progress is logged at this cadence while a wait is pending.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Why a wait was cancelled instead of completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The pane no longer shows the rate-limit notice.
    Recovered,
    /// The pane disappeared from the multiplexer.
    Vanished,
    /// The daemon is shutting down.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The reset time arrived; the caller should attempt a resume.
    Completed,
    Cancelled(CancelReason),
}

/// Blocks until `reset_at` or until a cancellation arrives, whichever is
/// first. A dropped sender counts as shutdown.
pub fn wait_until(
    reset_at: DateTime<Utc>,
    cancel: &Receiver<CancelReason>,
    progress_interval: Duration,
) -> WaitOutcome {
    loop {
        let remaining = reset_at - Utc::now();
        if remaining <= chrono::Duration::zero() {
            return WaitOutcome::Completed;
        }
        let chunk = remaining
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(progress_interval);
        match cancel.recv_timeout(chunk) {
            Ok(reason) => return WaitOutcome::Cancelled(reason),
            Err(RecvTimeoutError::Timeout) => {
                let remaining = reset_at - Utc::now();
                if remaining > chrono::Duration::minutes(1) {
                    tracing::info!(
                        remaining = %format_duration(remaining.num_seconds()),
                        "Waiting for rate limit reset"
                    );
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return WaitOutcome::Cancelled(CancelReason::Shutdown)
            }
        }
    }
}
