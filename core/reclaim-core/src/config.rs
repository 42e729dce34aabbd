//! Environment-driven configuration and well-known paths.
//!
//! The daemon takes all runtime knobs from the environment so it can run
//! under any supervisor without a config file.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default poll interval when `RECLAIM_POLL_INTERVAL` is unset.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

pub const POLL_INTERVAL_ENV: &str = "RECLAIM_POLL_INTERVAL";
pub const DEBUG_ENV: &str = "RECLAIM_DEBUG";

#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between poll cycles.
    pub poll_interval: Duration,
    /// Promotes logging to debug level.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            debug: false,
        }
    }
}

impl Config {
    /// Reads configuration from the environment, falling back to defaults
    /// for unset or unparsable values.
    pub fn from_env() -> Self {
        let poll_secs = env::var(POLL_INTERVAL_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        Self {
            poll_interval: Duration::from_secs(poll_secs),
            debug: debug_enabled(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// True when `RECLAIM_DEBUG` is set to an affirmative value.
pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            )
        })
        .unwrap_or(false)
}

/// Returns the path to the Claude directory (~/.claude).
pub fn claude_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude"))
}

/// Returns the path to the Claude Code OAuth credentials file.
pub fn credentials_path() -> Option<PathBuf> {
    claude_dir().map(|d| d.join(".credentials.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_interval_is_sixty_seconds() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert!(!config.debug);
    }

    #[test]
    fn with_poll_interval_overrides_default() {
        let config = Config::default().with_poll_interval(Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn credentials_path_lives_under_claude_dir() {
        if let Some(path) = credentials_path() {
            assert!(path.ends_with(".claude/.credentials.json"));
        }
    }
}
