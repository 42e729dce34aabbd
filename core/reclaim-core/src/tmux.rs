//! tmux pane enumeration, content capture and input dispatch.
//!
//! The engine depends only on the tri-fold multiplexer capability (list,
//! capture, send) expressed by [`MuxAdapter`]; `CommandMuxAdapter` shells
//! out to `tmux`, and tests substitute fakes.

use crate::error::{Result, WatchError};
use std::process::Command;

/// Lines of scrollback included in a capture. The rate-limit notice sits in
/// the currently visible region, so a shallow capture is enough.
pub const CAPTURE_LINES: u32 = 100;

/// Panes whose current command contains this substring are treated as
/// assistant sessions.
const AGENT_COMMAND_HINT: &str = "claude";

const PANE_LIST_FORMAT: &str = "#{pane_id}\t#{session_name}\t#{pane_current_command}";

/// Identity of one pane as reported by `list-panes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    pub id: String,
    pub session_name: String,
    pub command: String,
}

/// A pane snapshot with its currently visible text. Re-captured every poll
/// cycle; never updated in place.
#[derive(Debug, Clone)]
pub struct Pane {
    pub id: String,
    pub session_name: String,
    pub command: String,
    pub text: String,
}

/// The tri-fold multiplexer capability the engine depends on.
pub trait MuxAdapter: Send + Sync {
    fn list_panes(&self) -> Result<Vec<PaneInfo>>;
    fn capture(&self, pane_id: &str) -> Result<String>;
    fn send_text(&self, pane_id: &str, text: &str) -> Result<()>;
}

/// Adapter that shells out to the `tmux` binary. `TMUX_TMPDIR` is inherited
/// from the daemon's environment, so socket overrides work unchanged.
#[derive(Debug, Clone, Default)]
pub struct CommandMuxAdapter;

impl MuxAdapter for CommandMuxAdapter {
    fn list_panes(&self) -> Result<Vec<PaneInfo>> {
        let output = run_tmux(&["list-panes", "-a", "-F", PANE_LIST_FORMAT])?;
        Ok(parse_pane_list(&output))
    }

    fn capture(&self, pane_id: &str) -> Result<String> {
        let depth = format!("-{}", CAPTURE_LINES);
        run_tmux(&["capture-pane", "-t", pane_id, "-p", "-S", &depth])
    }

    fn send_text(&self, pane_id: &str, text: &str) -> Result<()> {
        run_tmux(&["send-keys", "-t", pane_id, text, "Enter"]).map(|_| ())
    }
}

/// True when a tmux server is reachable and has at least one session.
pub fn is_tmux_available() -> bool {
    run_tmux(&["list-sessions"]).is_ok()
}

fn run_tmux(args: &[&str]) -> Result<String> {
    let command = format!("tmux {}", args.join(" "));
    let output = Command::new("tmux")
        .args(args)
        .output()
        .map_err(|err| WatchError::TmuxCommand {
            command: command.clone(),
            details: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(WatchError::TmuxCommand {
            command,
            details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn parse_pane_list(output: &str) -> Vec<PaneInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let id = parts.next()?.trim();
            let session_name = parts.next()?.trim();
            let command = parts.next()?.trim();
            if id.is_empty() || session_name.is_empty() {
                return None;
            }
            Some(PaneInfo {
                id: id.to_string(),
                session_name: session_name.to_string(),
                command: command.to_string(),
            })
        })
        .collect()
}

/// Enumerates assistant panes and captures their visible text. Each call is
/// a fresh full snapshot.
pub struct PaneScanner {
    adapter: std::sync::Arc<dyn MuxAdapter>,
}

impl PaneScanner {
    pub fn new(adapter: std::sync::Arc<dyn MuxAdapter>) -> Self {
        Self { adapter }
    }

    pub fn scan(&self) -> Result<Vec<Pane>> {
        let infos = self.adapter.list_panes()?;
        let mut panes = Vec::new();
        for info in infos {
            if !info.command.to_lowercase().contains(AGENT_COMMAND_HINT) {
                continue;
            }
            // A pane that vanished between list and capture is omitted,
            // not an error.
            match self.adapter.capture(&info.id) {
                Ok(text) => panes.push(Pane {
                    id: info.id,
                    session_name: info.session_name,
                    command: info.command,
                    text,
                }),
                Err(err) => {
                    tracing::debug!(pane = %info.id, error = %err, "Capture failed; pane omitted");
                }
            }
        }
        Ok(panes)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeMuxAdapter;
    use super::*;
    use std::sync::Arc;

    #[test]
    fn parse_pane_list_ignores_invalid_lines() {
        let raw = "%1\tmain\tclaude\n%2\twork\tzsh\ninvalid\n\n%3\tside\tnode\n";
        let panes = parse_pane_list(raw);
        assert_eq!(panes.len(), 3);
        assert_eq!(panes[0].id, "%1");
        assert_eq!(panes[0].session_name, "main");
        assert_eq!(panes[0].command, "claude");
        assert_eq!(panes[2].id, "%3");
    }

    #[test]
    fn scan_keeps_only_assistant_panes() {
        let adapter = Arc::new(FakeMuxAdapter::new());
        adapter.add_pane("%1", "main", "some output");
        adapter.panes.lock().unwrap().push(PaneInfo {
            id: "%2".to_string(),
            session_name: "shell".to_string(),
            command: "zsh".to_string(),
        });
        let scanner = PaneScanner::new(adapter);
        let panes = scanner.scan().unwrap();
        assert_eq!(panes.len(), 1);
        assert_eq!(panes[0].id, "%1");
        assert_eq!(panes[0].text, "some output");
    }

    #[test]
    fn scan_omits_pane_that_vanished_before_capture() {
        let adapter = Arc::new(FakeMuxAdapter::new());
        adapter.add_pane("%1", "main", "hello");
        // Pane listed but its content is gone by capture time.
        adapter.contents.lock().unwrap().remove("%1");
        let scanner = PaneScanner::new(adapter);
        let panes = scanner.scan().unwrap();
        assert!(panes.is_empty());
    }
}
