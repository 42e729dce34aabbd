//! Resolution of free-form wall-clock expressions into absolute timestamps.
//!
//! Provider notices name a bare wall-clock time ("7pm", "3:30pm", "14:00"),
//! optionally with a parenthetical zone. The reset is always the *next*
//! occurrence of that time: a candidate at or before `now` rolls forward by
//! exactly one calendar day. No week or month math; reset windows in this
//! domain are always within 24 hours of being announced.

use crate::error::{Result, WatchError};
use crate::patterns::RE_CLOCK;
use chrono::{DateTime, Days, Local, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolves a wall-clock expression plus optional zone hint against `now`.
///
/// An unknown or absent zone hint falls back to the host local zone, which
/// is what the provider's message means when it omits one.
pub fn resolve(expr: &str, zone_hint: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let (hour, minute) = parse_clock(expr)?;
    let unresolvable = || WatchError::UnparsableReset(expr.to_string());

    match zone_hint.and_then(|hint| hint.trim().parse::<Tz>().ok()) {
        Some(tz) => {
            let local_now = now.with_timezone(&tz);
            next_occurrence(&tz, hour, minute, &local_now)
                .map(|t| t.with_timezone(&Utc))
                .ok_or_else(unresolvable)
        }
        None => {
            let local_now = now.with_timezone(&Local);
            next_occurrence(&Local, hour, minute, &local_now)
                .map(|t| t.with_timezone(&Utc))
                .ok_or_else(unresolvable)
        }
    }
}

/// Parses "7pm" / "3:30pm" / "14:00" into a 24-hour (hour, minute) pair.
fn parse_clock(expr: &str) -> Result<(u32, u32)> {
    let unparsable = || WatchError::UnparsableReset(expr.to_string());
    let caps = RE_CLOCK.captures(expr).ok_or_else(unparsable)?;

    let mut hour: u32 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(unparsable)?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().map_err(|_| unparsable())?,
        None => 0,
    };
    if minute > 59 {
        return Err(unparsable());
    }

    match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return Err(unparsable());
            }
            if meridiem == "pm" && hour != 12 {
                hour += 12;
            } else if meridiem == "am" && hour == 12 {
                hour = 0;
            }
        }
        None => {
            if hour > 23 {
                return Err(unparsable());
            }
        }
    }

    Ok((hour, minute))
}

/// The next instant with the given wall-clock time in `zone`, strictly
/// after `now`.
fn next_occurrence<Z: TimeZone>(
    zone: &Z,
    hour: u32,
    minute: u32,
    now: &DateTime<Z>,
) -> Option<DateTime<Z>> {
    let today = now.date_naive();
    if let Some(candidate) = localize(zone, today, hour, minute) {
        if candidate > *now {
            return Some(candidate);
        }
    }
    let tomorrow = today.checked_add_days(Days::new(1))?;
    localize(zone, tomorrow, hour, minute)
}

fn localize<Z: TimeZone>(zone: &Z, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Z>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        // Wall-clock time skipped by a DST jump; take the hour after the gap.
        LocalResult::None => zone
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn seven_pm_before_seven_resolves_today() {
        let now = at(2026, 8, 27, 18, 0);
        let resolved = resolve("7pm", Some("UTC"), now).unwrap();
        assert_eq!(resolved, at(2026, 8, 27, 19, 0));
    }

    #[test]
    fn seven_pm_after_seven_rolls_to_tomorrow() {
        let now = at(2026, 8, 27, 20, 0);
        let resolved = resolve("7pm", Some("UTC"), now).unwrap();
        assert_eq!(resolved, at(2026, 8, 28, 19, 0));
    }

    #[test]
    fn candidate_equal_to_now_rolls_to_tomorrow() {
        let now = at(2026, 8, 27, 19, 0);
        let resolved = resolve("7pm", Some("UTC"), now).unwrap();
        assert_eq!(resolved, at(2026, 8, 28, 19, 0));
    }

    #[test]
    fn minutes_and_24_hour_forms_parse() {
        let now = at(2026, 8, 27, 10, 0);
        assert_eq!(
            resolve("3:30pm", Some("UTC"), now).unwrap(),
            at(2026, 8, 27, 15, 30)
        );
        assert_eq!(
            resolve("14:00", Some("UTC"), now).unwrap(),
            at(2026, 8, 27, 14, 0)
        );
    }

    #[test]
    fn twelve_am_and_pm_follow_clock_convention() {
        let now = at(2026, 8, 27, 1, 0);
        assert_eq!(
            resolve("12pm", Some("UTC"), now).unwrap(),
            at(2026, 8, 27, 12, 0)
        );
        // Midnight has already passed, so 12am is tomorrow.
        assert_eq!(
            resolve("12am", Some("UTC"), now).unwrap(),
            at(2026, 8, 28, 0, 0)
        );
    }

    #[test]
    fn named_zone_hint_is_honored() {
        // 17:28 CDT on 2026-08-27 is 22:28 UTC; 7pm CDT is 00:00 UTC next day.
        let now = at(2026, 8, 27, 22, 28);
        let resolved = resolve("7pm", Some("America/Chicago"), now).unwrap();
        assert_eq!(resolved, at(2026, 8, 28, 0, 0));
    }

    #[test]
    fn unknown_zone_falls_back_to_local() {
        let now = Utc::now();
        let resolved = resolve("7pm", Some("Not/AZone"), now).unwrap();
        assert!(resolved > now);
        assert_eq!(resolved.with_timezone(&Local).hour(), 19);
    }

    #[test]
    fn unrecognized_expressions_fail() {
        let now = at(2026, 8, 27, 10, 0);
        for expr in ["soon", "25:00", "7:75pm", "13pm", ""] {
            assert!(resolve(expr, Some("UTC"), now).is_err(), "{expr:?}");
        }
    }
}
