//! reclaim: keeps rate-limited Claude Code tmux sessions moving.
//!
//! ## Subcommands
//!
//! - `status`: print current usage windows and utilization
//! - `detect`: one-shot detection pass over visible panes
//! - `daemon`: run the watch loop in the foreground

use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reclaim_core::config::{self, Config};
use reclaim_core::format::{format_bar, format_duration};
use reclaim_core::tmux::{is_tmux_available, CommandMuxAdapter, PaneScanner};
use reclaim_core::usage::{UsageClient, UsageSource};
use reclaim_core::{detect, Daemon};

const BAR_WIDTH: usize = 20;

#[derive(Parser)]
#[command(name = "reclaim")]
#[command(about = "Rate-limit watcher and auto-resumer for Claude Code tmux sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current usage windows and time to reset
    Status,

    /// Run one detection pass and report blocked panes without waiting
    Detect,

    /// Watch panes and auto-resume blocked sessions (foreground)
    Daemon {
        /// Seconds between poll cycles
        #[arg(short = 'i', long = "interval")]
        interval: Option<u64>,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => cmd_status(),
        Commands::Detect => cmd_detect(),
        Commands::Daemon { interval } => cmd_daemon(interval),
    }
}

fn init_logging() {
    let filter = if config::debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cmd_status() -> ExitCode {
    let client = match UsageClient::from_default_credentials() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!("hint: sign in with `claude` once so ~/.claude/.credentials.json exists");
            return ExitCode::FAILURE;
        }
    };
    let snapshot = match client.fetch() {
        Ok(snapshot) => snapshot,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    for (id, window) in snapshot.windows() {
        let bar = format_bar(window.utilization, BAR_WIDTH);
        let mut line = format!("{:<18} {} {:>5.1}%", id.label(), bar, window.utilization);
        if let Some(remaining) = window.resets_in(Utc::now()) {
            line.push_str(&format!(
                "  resets in {}",
                format_duration(remaining.num_seconds())
            ));
        }
        if window.is_limited() {
            line.push_str("  LIMITED");
        }
        println!("{line}");
    }
    ExitCode::SUCCESS
}

fn cmd_detect() -> ExitCode {
    let client = match UsageClient::from_default_credentials() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if !is_tmux_available() {
        eprintln!("error: no tmux server reachable");
        return ExitCode::FAILURE;
    }

    let snapshot = match client.fetch() {
        Ok(snapshot) => snapshot,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let scanner = PaneScanner::new(Arc::new(CommandMuxAdapter));
    let panes = match scanner.scan() {
        Ok(panes) => panes,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let blocked = detect(&snapshot, &panes, &HashSet::new(), Utc::now());
    if blocked.is_empty() {
        println!("OK: no rate-limited panes ({} assistant panes scanned)", panes.len());
        return ExitCode::SUCCESS;
    }
    for pane in &blocked {
        let remaining = (pane.resolved_reset_at - Utc::now()).num_seconds();
        println!(
            "RATE LIMITED  {} ({})  resumes in {}  [{}]",
            pane.pane_id,
            pane.session_name,
            format_duration(remaining),
            pane.matched_window
                .map(|w| w.label().to_string())
                .unwrap_or_else(|| "unmatched window".to_string()),
        );
        println!(
            "  resume manually: tmux send-keys -t {} continue Enter",
            pane.pane_id
        );
    }
    ExitCode::SUCCESS
}

fn cmd_daemon(interval: Option<u64>) -> ExitCode {
    let mut config = Config::from_env();
    if let Some(secs) = interval.filter(|secs| *secs > 0) {
        config = config.with_poll_interval(Duration::from_secs(secs));
    }

    let daemon = match Daemon::from_env(config) {
        Ok(daemon) => daemon,
        Err(err) => {
            tracing::error!(error = %err, "Daemon startup failed");
            return ExitCode::FAILURE;
        }
    };
    daemon.run();
    ExitCode::SUCCESS
}
