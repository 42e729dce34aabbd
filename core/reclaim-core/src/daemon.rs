//! Daemon loop, state machine and the active-waits table.
//!
//! One poll-loop thread plus one thread per active wait. The poll loop is
//! the only writer that inserts into `active_waits`; each wait thread
//! removes only its own entry. Cancellation is requested over the wait's
//! channel and removal is left to the owner, which keeps a completing wait
//! and a re-detection of the same pane from racing.

use crate::config::Config;
use crate::detect::{contains_rate_limit_notice, detect, BlockedPane};
use crate::error::{Result, WatchError};
use crate::format::format_duration;
use crate::resume::{resume, ResumeOutcome};
use crate::tmux::{is_tmux_available, CommandMuxAdapter, MuxAdapter, Pane, PaneScanner};
use crate::usage::{UsageClient, UsageSource};
use crate::waiter::{wait_until, CancelReason, WaitOutcome, PROGRESS_INTERVAL};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No known blocked panes.
    Idle,
    /// One or more waits are running.
    Watching,
    /// A continuation is being dispatched.
    Resuming,
}

/// Handle to one active wait, owned by the `active_waits` table.
pub struct WaitHandle {
    cancel: Sender<CancelReason>,
    pub reset_at: DateTime<Utc>,
}

/// Process-wide daemon state. One instance, process lifetime.
pub struct DaemonState {
    phase: Mutex<Phase>,
    active_waits: Mutex<HashMap<String, WaitHandle>>,
    last_poll_at: Mutex<Option<DateTime<Utc>>>,
}

impl DaemonState {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::Idle),
            active_waits: Mutex::new(HashMap::new()),
            last_poll_at: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap()
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.lock().unwrap() = phase;
    }

    pub fn active_ids(&self) -> HashSet<String> {
        self.active_waits.lock().unwrap().keys().cloned().collect()
    }

    pub fn wait_count(&self) -> usize {
        self.active_waits.lock().unwrap().len()
    }

    pub fn reset_time_for(&self, pane_id: &str) -> Option<DateTime<Utc>> {
        self.active_waits
            .lock()
            .unwrap()
            .get(pane_id)
            .map(|handle| handle.reset_at)
    }

    pub fn last_poll_at(&self) -> Option<DateTime<Utc>> {
        *self.last_poll_at.lock().unwrap()
    }

    fn touch_poll(&self, now: DateTime<Utc>) {
        *self.last_poll_at.lock().unwrap() = Some(now);
    }

    // Only the poll loop inserts.
    fn insert_wait(&self, pane_id: String, handle: WaitHandle) {
        self.active_waits.lock().unwrap().insert(pane_id, handle);
    }

    // Only the owning wait thread removes its own entry.
    fn remove_wait(&self, pane_id: &str) {
        self.active_waits.lock().unwrap().remove(pane_id);
    }

    /// Requests cancellation; removal stays with the owning wait thread.
    /// A send to an already-finished wait is harmless.
    fn request_cancel(&self, pane_id: &str, reason: CancelReason) {
        if let Some(handle) = self.active_waits.lock().unwrap().get(pane_id) {
            let _ = handle.cancel.send(reason);
        }
    }
}

impl Default for DaemonState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Daemon {
    config: Config,
    usage: Box<dyn UsageSource>,
    adapter: Arc<dyn MuxAdapter>,
    scanner: PaneScanner,
    state: Arc<DaemonState>,
    progress_interval: Duration,
}

impl Daemon {
    /// Builds the production daemon. Missing credentials or an unreachable
    /// tmux server are startup configuration errors.
    pub fn from_env(config: Config) -> Result<Self> {
        let usage = UsageClient::from_default_credentials()?;
        if !is_tmux_available() {
            return Err(WatchError::TmuxUnavailable);
        }
        Ok(Self::new(config, Box::new(usage), Arc::new(CommandMuxAdapter)))
    }

    pub fn new(config: Config, usage: Box<dyn UsageSource>, adapter: Arc<dyn MuxAdapter>) -> Self {
        let scanner = PaneScanner::new(Arc::clone(&adapter));
        Self {
            config,
            usage,
            adapter,
            scanner,
            state: Arc::new(DaemonState::new()),
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    pub fn state(&self) -> Arc<DaemonState> {
        Arc::clone(&self.state)
    }

    /// Runs the poll loop forever. Per-cycle errors are contained; only an
    /// external signal ends the process.
    pub fn run(&self) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "reclaim daemon started"
        );
        loop {
            if let Err(err) = self.cycle() {
                if err.is_transient() {
                    tracing::debug!(error = %err, "Transient failure; cycle skipped");
                } else {
                    tracing::warn!(error = %err, "Poll cycle failed");
                }
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    /// One poll cycle: fetch usage, scan panes, reconcile existing waits,
    /// detect, spawn new waits. A failed fetch or scan returns before the
    /// reconcile step, so existing waits are left untouched.
    pub fn cycle(&self) -> Result<()> {
        let snapshot = self.usage.fetch()?;
        let panes = self.scanner.scan()?;
        self.reconcile_waits(&panes);

        // Detection completes fully before any wait is spawned.
        let active = self.state.active_ids();
        let blocked = detect(&snapshot, &panes, &active, Utc::now());
        for pane in blocked {
            self.spawn_wait(pane);
        }

        self.state.touch_poll(Utc::now());
        self.state.set_phase(if self.state.wait_count() == 0 {
            Phase::Idle
        } else {
            Phase::Watching
        });
        Ok(())
    }

    /// Cancels waits whose pane recovered on its own or disappeared.
    fn reconcile_waits(&self, panes: &[Pane]) {
        let by_id: HashMap<&str, &Pane> = panes.iter().map(|p| (p.id.as_str(), p)).collect();
        for pane_id in self.state.active_ids() {
            match by_id.get(pane_id.as_str()) {
                None => {
                    tracing::info!(pane = %pane_id, "Pane vanished; cancelling wait");
                    self.state.request_cancel(&pane_id, CancelReason::Vanished);
                }
                Some(pane) if !contains_rate_limit_notice(&pane.text) => {
                    tracing::info!(pane = %pane_id, "Pane recovered on its own; cancelling wait");
                    self.state.request_cancel(&pane_id, CancelReason::Recovered);
                }
                Some(_) => {}
            }
        }
    }

    fn spawn_wait(&self, blocked: BlockedPane) {
        let remaining = blocked.resolved_reset_at - Utc::now();
        tracing::info!(
            pane = %blocked.pane_id,
            session = %blocked.session_name,
            reset_at = %blocked.resolved_reset_at,
            remaining = %format_duration(remaining.num_seconds()),
            window = ?blocked.matched_window,
            "Blocked session detected; wait scheduled"
        );

        let (tx, rx) = mpsc::channel();
        self.state.insert_wait(
            blocked.pane_id.clone(),
            WaitHandle {
                cancel: tx,
                reset_at: blocked.resolved_reset_at,
            },
        );
        self.state.set_phase(Phase::Watching);

        let adapter = Arc::clone(&self.adapter);
        let state = Arc::clone(&self.state);
        let progress = self.progress_interval;
        thread::spawn(move || run_wait(blocked, rx, adapter, state, progress));
    }
}

fn run_wait(
    blocked: BlockedPane,
    cancel: mpsc::Receiver<CancelReason>,
    adapter: Arc<dyn MuxAdapter>,
    state: Arc<DaemonState>,
    progress: Duration,
) {
    match wait_until(blocked.resolved_reset_at, &cancel, progress) {
        WaitOutcome::Completed => {
            state.set_phase(Phase::Resuming);
            match resume(adapter.as_ref(), &blocked.pane_id) {
                ResumeOutcome::Resumed => {
                    tracing::info!(
                        pane = %blocked.pane_id,
                        session = %blocked.session_name,
                        "Continuation sent"
                    );
                }
                ResumeOutcome::Skipped => {
                    tracing::info!(
                        pane = %blocked.pane_id,
                        "Pane already recovered; nothing sent"
                    );
                }
                ResumeOutcome::Failed(details) => {
                    tracing::warn!(
                        pane = %blocked.pane_id,
                        details = %details,
                        "Resume dispatch failed; wait dropped"
                    );
                }
            }
        }
        WaitOutcome::Cancelled(reason) => {
            tracing::info!(pane = %blocked.pane_id, reason = ?reason, "Wait cancelled; no resume");
        }
    }
    state.remove_wait(&blocked.pane_id);
    state.set_phase(if state.wait_count() == 0 {
        Phase::Idle
    } else {
        Phase::Watching
    });
}
