//! OAuth usage-utilization API client and per-window usage types.
//!
//! One authenticated GET per poll cycle; the response is the authoritative
//! utilization state for that cycle and is never cached across polls.

use crate::config::credentials_path;
use crate::error::{Result, WatchError};
use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const USAGE_API_URL: &str = "https://api.anthropic.com/api/oauth/usage";
const OAUTH_BETA: &str = "oauth-2025-04-20";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider-defined quota windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowId {
    FiveHour,
    SevenDay,
    SevenDayOpus,
}

impl WindowId {
    pub fn label(&self) -> &'static str {
        match self {
            WindowId::FiveHour => "5-hour",
            WindowId::SevenDay => "7-day",
            WindowId::SevenDayOpus => "7-day Opus",
        }
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rate-limit usage for one window. Immutable once read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageWindow {
    /// Percentage of quota consumed, 0-100. 100 means exhausted.
    pub utilization: f64,
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    pub fn is_limited(&self) -> bool {
        self.utilization >= 100.0
    }

    /// Time until reset, clamped to zero, or None when the API gave no
    /// reset timestamp.
    pub fn resets_in(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.resets_at
            .map(|at| (at - now).max(chrono::Duration::zero()))
    }
}

/// All windows from one poll of the usage API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageSnapshot {
    pub five_hour: UsageWindow,
    pub seven_day: UsageWindow,
    pub seven_day_opus: Option<UsageWindow>,
}

impl UsageSnapshot {
    pub fn windows(&self) -> Vec<(WindowId, &UsageWindow)> {
        let mut windows = vec![
            (WindowId::FiveHour, &self.five_hour),
            (WindowId::SevenDay, &self.seven_day),
        ];
        if let Some(opus) = &self.seven_day_opus {
            windows.push((WindowId::SevenDayOpus, opus));
        }
        windows
    }

    /// True if any window is exhausted.
    pub fn is_limited(&self) -> bool {
        self.windows().iter().any(|(_, w)| w.is_limited())
    }

    pub fn limited_windows(&self) -> Vec<(WindowId, &UsageWindow)> {
        self.windows()
            .into_iter()
            .filter(|(_, w)| w.is_limited())
            .collect()
    }

    /// Earliest reset time across limited windows.
    pub fn next_reset(&self) -> Option<DateTime<Utc>> {
        self.limited_windows()
            .into_iter()
            .filter_map(|(_, w)| w.resets_at)
            .min()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawUsage {
    #[serde(default)]
    five_hour: Option<RawWindow>,
    #[serde(default)]
    seven_day: Option<RawWindow>,
    #[serde(default)]
    seven_day_opus: Option<RawWindow>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWindow {
    #[serde(default)]
    utilization: f64,
    #[serde(default)]
    resets_at: Option<String>,
}

fn window_from_raw(raw: Option<RawWindow>) -> UsageWindow {
    let raw = raw.unwrap_or_default();
    UsageWindow {
        utilization: raw.utilization,
        resets_at: raw.resets_at.as_deref().and_then(parse_reset_timestamp),
    }
}

fn parse_reset_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub(crate) fn parse_snapshot(body: &str) -> Result<UsageSnapshot> {
    let raw: RawUsage =
        serde_json::from_str(body).map_err(|err| WatchError::UsageDecode(err.to_string()))?;
    Ok(UsageSnapshot {
        five_hour: window_from_raw(raw.five_hour),
        seven_day: window_from_raw(raw.seven_day),
        seven_day_opus: raw.seven_day_opus.map(|w| window_from_raw(Some(w))),
    })
}

// ─────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "claudeAiOauth", default)]
    claude_ai_oauth: Option<OauthSection>,
}

#[derive(Deserialize)]
struct OauthSection {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
}

/// Loads the OAuth access token from the Claude Code credentials file.
pub fn load_access_token(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(WatchError::CredentialsNotFound(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|err| WatchError::Io {
        context: format!("reading {}", path.display()),
        source: err,
    })?;
    let creds: CredentialsFile =
        serde_json::from_str(&raw).map_err(|err| WatchError::CredentialsMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })?;
    creds
        .claude_ai_oauth
        .and_then(|oauth| oauth.access_token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| WatchError::CredentialsMalformed {
            path: path.to_path_buf(),
            details: "missing claudeAiOauth.accessToken".to_string(),
        })
}

// ─────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────

/// Seam for the usage API so the daemon can be driven by fakes in tests.
pub trait UsageSource: Send + Sync {
    fn fetch(&self) -> Result<UsageSnapshot>;
}

pub struct UsageClient {
    http: reqwest::blocking::Client,
    token: String,
}

impl UsageClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
        })
    }

    /// Builds a client from `~/.claude/.credentials.json`.
    pub fn from_default_credentials() -> Result<Self> {
        let path = credentials_path().ok_or_else(|| {
            WatchError::CredentialsNotFound(PathBuf::from("~/.claude/.credentials.json"))
        })?;
        Self::new(load_access_token(&path)?)
    }
}

impl UsageSource for UsageClient {
    fn fetch(&self) -> Result<UsageSnapshot> {
        let response = self
            .http
            .get(USAGE_API_URL)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("anthropic-beta", OAUTH_BETA)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::UsageStatus {
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        parse_snapshot(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    #[test]
    fn parses_all_three_windows() {
        let body = r#"{
            "five_hour": {"utilization": 100.0, "resets_at": "2026-08-27T19:00:00Z"},
            "seven_day": {"utilization": 42.5, "resets_at": "2026-08-30T00:00:00Z"},
            "seven_day_opus": {"utilization": 12.0, "resets_at": null}
        }"#;
        let snapshot = parse_snapshot(body).unwrap();
        assert!(snapshot.five_hour.is_limited());
        assert_eq!(
            snapshot.five_hour.resets_at,
            Some(Utc.with_ymd_and_hms(2026, 8, 27, 19, 0, 0).unwrap())
        );
        assert!(!snapshot.seven_day.is_limited());
        assert_eq!(snapshot.seven_day_opus.as_ref().unwrap().utilization, 12.0);
        assert!(snapshot.is_limited());
    }

    #[test]
    fn missing_windows_default_to_zero_utilization() {
        let snapshot = parse_snapshot("{}").unwrap();
        assert_eq!(snapshot.five_hour.utilization, 0.0);
        assert!(snapshot.seven_day_opus.is_none());
        assert!(!snapshot.is_limited());
        assert!(snapshot.next_reset().is_none());
    }

    #[test]
    fn unparsable_reset_timestamp_becomes_none() {
        let body = r#"{"five_hour": {"utilization": 100.0, "resets_at": "not-a-date"}}"#;
        let snapshot = parse_snapshot(body).unwrap();
        assert!(snapshot.five_hour.resets_at.is_none());
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let err = parse_snapshot("not json").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn next_reset_picks_earliest_limited_window() {
        let body = r#"{
            "five_hour": {"utilization": 100.0, "resets_at": "2026-08-27T19:00:00Z"},
            "seven_day": {"utilization": 100.0, "resets_at": "2026-08-30T00:00:00Z"}
        }"#;
        let snapshot = parse_snapshot(body).unwrap();
        assert_eq!(
            snapshot.next_reset(),
            Some(Utc.with_ymd_and_hms(2026, 8, 27, 19, 0, 0).unwrap())
        );
    }

    #[test]
    fn resets_in_clamps_past_times_to_zero() {
        let window = UsageWindow {
            utilization: 100.0,
            resets_at: Some(Utc.with_ymd_and_hms(2026, 8, 27, 19, 0, 0).unwrap()),
        };
        let later = Utc.with_ymd_and_hms(2026, 8, 27, 20, 0, 0).unwrap();
        assert_eq!(window.resets_in(later), Some(chrono::Duration::zero()));
    }

    #[test]
    fn access_token_loads_from_credentials_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"claudeAiOauth": {{"accessToken": "sk-test-token"}}}}"#
        )
        .unwrap();
        assert_eq!(load_access_token(file.path()).unwrap(), "sk-test-token");
    }

    #[test]
    fn missing_token_field_is_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"claudeAiOauth": {{}}}}"#).unwrap();
        assert!(matches!(
            load_access_token(file.path()),
            Err(WatchError::CredentialsMalformed { .. })
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            load_access_token(&path),
            Err(WatchError::CredentialsNotFound(_))
        ));
    }
}
