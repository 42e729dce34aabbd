//! Rate-limit wait extraction from hook payload and transcript text.
//!
//! Preference order: an explicit reset clock time ("reset at 7pm"), then a
//! relative duration ("try again in 30 seconds"), then a fixed default.
//! Text this loose needs a cheap indicator gate first so an ordinary stop
//! never pays the extraction cost or risks a false wait.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use reclaim_core::patterns::{RATE_LIMIT_INDICATORS, RE_RESET_AT};
use reclaim_core::timeparse;

/// Wait applied when a rate limit is evident but no time can be extracted.
pub const DEFAULT_WAIT_SECS: i64 = 300;

/// "30 seconds", "5 min", "2 hours".
static RE_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?)").unwrap()
});

/// `retry_after: 30`, `retry-after" 30`.
static RE_RETRY_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)retry[_-]?after["\s:]+(\d+)"#).unwrap());

/// "in 5:30" (minutes:seconds).
static RE_COLON_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)in\s+(\d+):(\d{2})").unwrap());

/// How long the hook should hold the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPlan {
    /// Sleep until an absolute reset time parsed from the text.
    Until(DateTime<Utc>),
    /// Sleep a relative number of seconds.
    Seconds(i64),
}

impl WaitPlan {
    pub fn wait_seconds(&self, now: DateTime<Utc>) -> i64 {
        match self {
            WaitPlan::Until(at) => (*at - now).num_seconds(),
            WaitPlan::Seconds(secs) => *secs,
        }
    }
}

/// Decides whether the combined text describes a rate limit and, if so,
/// how long to wait. None means let the stop proceed.
pub fn find_rate_limit_wait(text: &str, now: DateTime<Utc>) -> Option<WaitPlan> {
    let lowered = text.to_lowercase();
    if !RATE_LIMIT_INDICATORS.iter().any(|ind| lowered.contains(ind)) {
        return None;
    }

    if let Some(caps) = RE_RESET_AT.captures(text) {
        let expr = caps.name("time").map(|m| m.as_str().trim());
        let zone = caps.name("zone").map(|m| m.as_str().trim());
        if let Some(expr) = expr {
            match timeparse::resolve(expr, zone, now) {
                Ok(at) => return Some(WaitPlan::Until(at)),
                Err(err) => {
                    tracing::debug!(error = %err, "Reset time unusable; trying duration forms");
                }
            }
        }
    }

    if let Some(secs) = extract_wait_seconds(text) {
        return Some(WaitPlan::Seconds(secs));
    }
    Some(WaitPlan::Seconds(DEFAULT_WAIT_SECS))
}

fn extract_wait_seconds(text: &str) -> Option<i64> {
    if let Some(caps) = RE_DURATION.captures(text) {
        let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str().to_lowercase();
        let secs = if unit.starts_with("min") {
            amount * 60
        } else if unit.starts_with("hour") || unit.starts_with("hr") {
            amount * 3600
        } else {
            amount
        };
        return Some(secs);
    }
    if let Some(caps) = RE_RETRY_AFTER.captures(text) {
        return caps.get(1)?.as_str().parse().ok();
    }
    if let Some(caps) = RE_COLON_DURATION.captures(text) {
        let minutes: i64 = caps.get(1)?.as_str().parse().ok()?;
        let seconds: i64 = caps.get(2)?.as_str().parse().ok()?;
        return Some(minutes * 60 + seconds);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 27, 22, 28, 0).unwrap()
    }

    #[test]
    fn ordinary_stop_text_yields_no_wait() {
        assert_eq!(find_rate_limit_wait("task finished, all tests pass", now()), None);
    }

    #[test]
    fn reset_clock_time_is_preferred() {
        let plan = find_rate_limit_wait(
            "usage limit reached. Your limit will reset at 7pm (UTC)",
            now(),
        )
        .unwrap();
        assert_eq!(
            plan,
            WaitPlan::Until(Utc.with_ymd_and_hms(2026, 8, 28, 19, 0, 0).unwrap())
        );
    }

    #[test]
    fn relative_duration_is_the_fallback() {
        let plan = find_rate_limit_wait("rate limit: try again in 30 seconds", now()).unwrap();
        assert_eq!(plan, WaitPlan::Seconds(30));

        let plan = find_rate_limit_wait("429 too many requests, wait 5 minutes", now()).unwrap();
        assert_eq!(plan, WaitPlan::Seconds(300));

        let plan = find_rate_limit_wait("rate limit hit, back off 2 hours", now()).unwrap();
        assert_eq!(plan, WaitPlan::Seconds(7200));
    }

    #[test]
    fn retry_after_field_is_read() {
        let plan =
            find_rate_limit_wait(r#"rate_limit {"retry_after": 45}"#, now()).unwrap();
        assert_eq!(plan, WaitPlan::Seconds(45));
    }

    #[test]
    fn colon_duration_form_is_read() {
        let plan = find_rate_limit_wait("rate limit, retry in 5:30", now()).unwrap();
        assert_eq!(plan, WaitPlan::Seconds(330));
    }

    #[test]
    fn indicator_without_a_time_uses_the_default() {
        let plan = find_rate_limit_wait("usage limit reached, please hold", now()).unwrap();
        assert_eq!(plan, WaitPlan::Seconds(DEFAULT_WAIT_SECS));
    }

    #[test]
    fn until_plan_reports_remaining_seconds() {
        let plan = WaitPlan::Until(now() + chrono::Duration::seconds(90));
        assert_eq!(plan.wait_seconds(now()), 90);
    }
}
