//! reclaim-hook: Claude Code Stop hook that waits out rate limits.
//!
//! Configured as a Stop hook in ~/.claude/settings.json. When the session
//! stops because of a rate limit, the hook extracts the reset time from the
//! hook payload and transcript tail, sleeps until the limit lifts, then
//! blocks the stop with "continue" so the session picks back up. Any other
//! stop is approved untouched.
//!
//! The daemon covers sessions from the outside via tmux; this hook covers
//! the session from the inside and needs no tmux at all. Either alone is
//! enough, together they are redundant by intent.

mod scan;
mod transcript;

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use reclaim_core::config;
use reclaim_core::format::format_duration;
use reclaim_hook_protocol::{StopHookInput, StopHookOutput};
use scan::find_rate_limit_wait;

/// Waits never exceed this, whatever the text claims. Quota windows reset
/// at most five hours out.
const MAX_WAIT_SECS: i64 = 6 * 3600;

/// Cadence of "still waiting" lines on stderr.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5 * 60);

fn main() -> ExitCode {
    init_logging();

    let mut raw = String::new();
    if std::io::stdin().read_to_string(&mut raw).is_err() {
        emit(&StopHookOutput::approve());
        return ExitCode::SUCCESS;
    }
    let input: StopHookInput = match serde_json::from_str(raw.trim()) {
        Ok(input) => input,
        Err(err) => {
            tracing::debug!(error = %err, "Hook payload unparsable; approving stop");
            emit(&StopHookOutput::approve());
            return ExitCode::SUCCESS;
        }
    };

    // This stop was caused by our own block decision. Blocking again would
    // loop the session forever.
    if input.stop_hook_active {
        emit(&StopHookOutput::approve());
        return ExitCode::SUCCESS;
    }

    let mut text = raw;
    if !input.transcript_path.is_empty() {
        let entries = transcript::read_tail(Path::new(&input.transcript_path));
        tracing::debug!(entries = entries.len(), "Transcript tail read");
        text.push(' ');
        text.push_str(&transcript::search_text(&entries));
    }

    let now = Utc::now();
    let Some(plan) = find_rate_limit_wait(&text, now) else {
        tracing::debug!("No rate limit evident; approving stop");
        emit(&StopHookOutput::approve());
        return ExitCode::SUCCESS;
    };

    let wait_secs = plan.wait_seconds(now);
    if wait_secs <= 0 {
        emit(&StopHookOutput::approve());
        return ExitCode::SUCCESS;
    }
    let wait_secs = wait_secs.min(MAX_WAIT_SECS);

    eprintln!(
        "Rate limit reached. Waiting {}...",
        format_duration(wait_secs)
    );
    sleep_with_progress(wait_secs);
    eprintln!("Rate limit reset. Continuing...");

    emit(&StopHookOutput::block("continue"));
    ExitCode::SUCCESS
}

/// Sleeps `wait_secs` in chunks, reporting remaining time on stderr so a
/// user watching the session knows the hook is alive.
fn sleep_with_progress(wait_secs: i64) {
    let start = Instant::now();
    let total = Duration::from_secs(wait_secs as u64);
    loop {
        let elapsed = start.elapsed();
        if elapsed >= total {
            return;
        }
        let remaining = total - elapsed;
        thread::sleep(remaining.min(PROGRESS_INTERVAL));

        let elapsed = start.elapsed();
        if total > elapsed && (total - elapsed) > Duration::from_secs(60) {
            eprintln!(
                "{} remaining...",
                format_duration((total - elapsed).as_secs() as i64)
            );
        }
    }
}

fn emit(output: &StopHookOutput) {
    // A decision that fails to serialize has no fallback; approve is the
    // safe wire form.
    match serde_json::to_string(output) {
        Ok(json) => println!("{json}"),
        Err(_) => println!(r#"{{"decision":"approve"}}"#),
    }
}

fn init_logging() {
    let filter = if config::debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
