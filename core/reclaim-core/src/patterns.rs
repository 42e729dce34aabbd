//! Compiled regex patterns for recognizing provider rate-limit notices.
//!
//! Compiled once on first use and reused by detection, resume re-checks and
//! the Stop-hook handler. Update these when the provider's message wording
//! changes.

use once_cell::sync::Lazy;
use regex::Regex;

/// The full rate-limit notice as rendered in a pane:
/// "Claude usage limit reached. Your limit will reset at 7pm (America/Chicago)."
///
/// Captures `time` (e.g. "7pm", "3:30pm", "14:00") and an optional
/// parenthetical `zone`.
pub static RE_RATE_LIMIT_NOTICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)claude\s+usage\s+limit\s+reached.*?limit\s+will\s+reset\s+at\s+(?P<time>\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\s*(?:\((?P<zone>[^)]+)\))?",
    )
    .unwrap()
});

/// Looser "reset at <time>" form used when scanning hook payloads and
/// transcript text, where the surrounding notice may be truncated.
pub static RE_RESET_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)resets?\s+at\s+(?P<time>\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\s*(?:\((?P<zone>[^)]+)\))?",
    )
    .unwrap()
});

/// A bare wall-clock expression: "7pm", "3:30pm", "14:00".
pub static RE_CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\s*$").unwrap());

/// Substring indicators that a matched notice is quoted code, test input or
/// a diff rather than a live provider message. Checked against a lowercased
/// window of text preceding the match.
pub const CODE_CONTEXT_INDICATORS: &[&str] = &[
    "content = \"",
    "content=\"",
    "= \"claude",
    ">>> ",
    "... ",
    "\n+",
];

/// Cheap substring indicators that some rate-limit event is being discussed,
/// used by the Stop-hook handler before attempting time extraction.
pub const RATE_LIMIT_INDICATORS: &[&str] = &[
    "usage limit",
    "rate limit",
    "limit reached",
    "rate_limit",
    "ratelimit",
    "429",
    "too many requests",
    "try again",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_regex_captures_time_and_zone() {
        let text = "Claude usage limit reached. Your limit will reset at 7pm (America/Chicago).";
        let caps = RE_RATE_LIMIT_NOTICE.captures(text).expect("match");
        assert_eq!(caps.name("time").unwrap().as_str(), "7pm");
        assert_eq!(caps.name("zone").unwrap().as_str(), "America/Chicago");
    }

    #[test]
    fn notice_regex_accepts_minutes_and_missing_zone() {
        let text = "claude usage limit reached. your limit will reset at 3:30pm";
        let caps = RE_RATE_LIMIT_NOTICE.captures(text).expect("match");
        assert_eq!(caps.name("time").unwrap().as_str(), "3:30pm");
        assert!(caps.name("zone").is_none());
    }

    #[test]
    fn notice_regex_spans_wrapped_lines() {
        let text = "Claude usage limit reached.\nYour limit will\nreset at 9am (Asia/Tokyo)";
        let caps = RE_RATE_LIMIT_NOTICE.captures(text).expect("match");
        assert_eq!(caps.name("time").unwrap().as_str(), "9am");
        assert_eq!(caps.name("zone").unwrap().as_str(), "Asia/Tokyo");
    }

    #[test]
    fn reset_at_regex_accepts_24_hour_form() {
        let caps = RE_RESET_AT.captures("resets at 14:00").expect("match");
        assert_eq!(caps.name("time").unwrap().as_str(), "14:00");
    }

    #[test]
    fn unrelated_text_does_not_match() {
        assert!(RE_RATE_LIMIT_NOTICE
            .captures("compiling reclaim-core v0.1.0")
            .is_none());
    }
}
