//! Dual-signal rate-limit detection.
//!
//! A pane is blocked only when BOTH signals agree: some usage window is at
//! 100% utilization (the global gate) AND the pane's visible text carries
//! the provider's rate-limit notice. API utilization alone can belong to a
//! session elsewhere; notice text alone can be stale or quoted. The pane's
//! parsed reset time is authoritative for that pane's wait target; the
//! matched API window is informational.

use crate::patterns::{CODE_CONTEXT_INDICATORS, RE_RATE_LIMIT_NOTICE};
use crate::timeparse;
use crate::tmux::Pane;
use crate::usage::{UsageSnapshot, UsageWindow, WindowId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Max disagreement between a saturated window's API reset time and the
/// pane's parsed reset time for the window to count as matched.
pub const RESET_MATCH_TOLERANCE_SECS: i64 = 15 * 60;

/// Bytes of preceding context inspected for code/diff indicators.
const CODE_CONTEXT_WINDOW: usize = 50;

/// A rate-limit notice parsed out of pane text. Transient; exists only
/// during detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetNotice {
    /// The full matched notice, useful for logging.
    pub raw: String,
    /// The wall-clock expression ("7pm", "3:30pm", "14:00").
    pub expression: String,
    /// Parenthetical zone name, if the notice carried one.
    pub zone_hint: Option<String>,
}

/// A pane confirmed blocked by both signals. Owned by exactly one wait for
/// its lifetime.
#[derive(Debug, Clone)]
pub struct BlockedPane {
    pub pane_id: String,
    pub session_name: String,
    pub notice: String,
    pub resolved_reset_at: DateTime<Utc>,
    pub matched_window: Option<WindowId>,
}

/// Extracts the rate-limit notice from pane text, rejecting matches that
/// appear inside quoted code, test fixtures or diffs.
pub fn extract_reset_notice(text: &str) -> Option<ResetNotice> {
    let caps = RE_RATE_LIMIT_NOTICE.captures(text)?;
    let whole = caps.get(0)?;
    if looks_like_code_context(text, whole.start(), whole.end()) {
        return None;
    }
    Some(ResetNotice {
        raw: whole.as_str().to_string(),
        expression: caps.name("time")?.as_str().trim().to_string(),
        zone_hint: caps.name("zone").map(|m| m.as_str().trim().to_string()),
    })
}

/// True when the pane currently shows a live rate-limit notice.
pub fn contains_rate_limit_notice(text: &str) -> bool {
    extract_reset_notice(text).is_some()
}

fn looks_like_code_context(text: &str, start: usize, end: usize) -> bool {
    let mut from = start.saturating_sub(CODE_CONTEXT_WINDOW);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let window = text[from..end].to_lowercase();
    CODE_CONTEXT_INDICATORS
        .iter()
        .any(|indicator| window.contains(indicator))
}

/// Combines the cycle's usage snapshot and pane snapshots into the set of
/// genuinely blocked panes. Pure: no I/O, no clock reads.
///
/// Panes already owned by an active wait are skipped, so re-detecting a
/// waiting pane is a no-op rather than a duplicate wait.
pub fn detect(
    snapshot: &UsageSnapshot,
    panes: &[Pane],
    active: &HashSet<String>,
    now: DateTime<Utc>,
) -> Vec<BlockedPane> {
    // Global gate: pane text alone never triggers detection.
    if !snapshot.is_limited() {
        return Vec::new();
    }
    let saturated = snapshot.limited_windows();

    let mut blocked = Vec::new();
    for pane in panes {
        if active.contains(&pane.id) {
            tracing::debug!(pane = %pane.id, "Wait already active; skipping");
            continue;
        }
        let Some(notice) = extract_reset_notice(&pane.text) else {
            continue;
        };
        let resolved =
            match timeparse::resolve(&notice.expression, notice.zone_hint.as_deref(), now) {
                Ok(at) => at,
                Err(err) => {
                    tracing::debug!(
                        pane = %pane.id,
                        error = %err,
                        "Reset time unusable; skipping pane this cycle"
                    );
                    continue;
                }
            };
        blocked.push(BlockedPane {
            pane_id: pane.id.clone(),
            session_name: pane.session_name.clone(),
            notice: notice.raw,
            resolved_reset_at: resolved,
            matched_window: closest_window(&saturated, resolved),
        });
    }
    blocked
}

/// The saturated window whose API reset time lies closest to the parsed
/// time, within tolerance. None means the parsed time stands alone.
fn closest_window(
    saturated: &[(WindowId, &UsageWindow)],
    resolved: DateTime<Utc>,
) -> Option<WindowId> {
    saturated
        .iter()
        .filter_map(|(id, window)| {
            window
                .resets_at
                .map(|at| (*id, (at - resolved).num_seconds().abs()))
        })
        .filter(|(_, delta)| *delta <= RESET_MATCH_TOLERANCE_SECS)
        .min_by_key(|(_, delta)| *delta)
        .map(|(id, _)| id)
}
