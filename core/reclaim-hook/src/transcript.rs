//! Transcript tail reader.
//!
//! Claude Code transcripts are JSONL; only the most recent entries can
//! mention the rate limit that triggered this Stop event, so the reader
//! keeps a bounded tail and drops lines that fail to parse.

use fs_err as fs;
use serde_json::Value;
use std::path::Path;

/// Lines read from the end of the transcript file.
pub const TAIL_LINES: usize = 100;

/// Of the tail, only this many of the newest entries are searched.
pub const SEARCH_ENTRIES: usize = 20;

/// Reads up to [`TAIL_LINES`] trailing entries. A missing or unreadable
/// transcript is an empty tail, never an error; the hook must not fail a
/// Stop event over a transcript problem.
pub fn read_tail(path: &Path) -> Vec<Value> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "Transcript unreadable");
            return Vec::new();
        }
    };
    let lines: Vec<&str> = raw.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..]
        .iter()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            serde_json::from_str(line).ok()
        })
        .collect()
}

/// Concatenates the newest [`SEARCH_ENTRIES`] entries into one searchable
/// string.
pub fn search_text(entries: &[Value]) -> String {
    let start = entries.len().saturating_sub(SEARCH_ENTRIES);
    entries[start..]
        .iter()
        .map(|entry| entry.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
