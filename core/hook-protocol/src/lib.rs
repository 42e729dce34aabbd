//! Wire types for the Claude Code Stop hook.
//!
//! Claude Code pipes a JSON payload to the hook's stdin and reads a JSON
//! decision from its stdout. These types pin both halves of that contract
//! in one place so the hook binary cannot drift from the documented schema.

use serde::{Deserialize, Serialize};

/// Payload Claude Code writes to the hook's stdin on a Stop event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopHookInput {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub hook_event_name: String,
    /// True when this Stop event was itself caused by a hook's block
    /// decision. A blocking response here would loop forever.
    #[serde(default)]
    pub stop_hook_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Block,
}

/// Decision the hook writes to stdout. Field names follow the hook schema,
/// not Rust convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopHookOutput {
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_: Option<bool>,
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(rename = "suppressOutput", skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,
    #[serde(rename = "systemMessage", skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

impl StopHookOutput {
    /// Let the session stop normally.
    pub fn approve() -> Self {
        Self {
            decision: Decision::Approve,
            reason: None,
            continue_: None,
            stop_reason: None,
            suppress_output: None,
            system_message: None,
        }
    }

    /// Block the stop and feed `reason` back to the session as its next
    /// input.
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Block,
            reason: Some(reason.into()),
            continue_: None,
            stop_reason: None,
            suppress_output: None,
            system_message: None,
        }
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    /// Schema problems a decision would have on the wire. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        match self.decision {
            Decision::Block => {
                if self.reason.as_deref().map_or(true, str::is_empty) {
                    problems.push("block decision requires a non-empty reason".to_string());
                }
            }
            Decision::Approve => {
                if self.reason.is_some() {
                    problems.push("approve decision must not carry a reason".to_string());
                }
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_tolerates_missing_fields() {
        let input: StopHookInput = serde_json::from_str("{}").unwrap();
        assert!(!input.stop_hook_active);
        assert!(input.transcript_path.is_empty());
    }

    #[test]
    fn input_reads_documented_fields() {
        let input: StopHookInput = serde_json::from_str(
            r#"{
                "session_id": "abc",
                "transcript_path": "/tmp/t.jsonl",
                "cwd": "/work",
                "hook_event_name": "Stop",
                "stop_hook_active": true
            }"#,
        )
        .unwrap();
        assert_eq!(input.session_id, "abc");
        assert!(input.stop_hook_active);
    }

    #[test]
    fn block_serializes_with_schema_field_names() {
        let output = StopHookOutput::block("continue");
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["decision"], "block");
        assert_eq!(json["reason"], "continue");
        assert!(json.get("stopReason").is_none());
        assert!(json.get("continue").is_none());
    }

    #[test]
    fn approve_omits_optional_fields_entirely() {
        let json = serde_json::to_string(&StopHookOutput::approve()).unwrap();
        assert_eq!(json, r#"{"decision":"approve"}"#);
    }

    #[test]
    fn validate_flags_block_without_reason() {
        let mut output = StopHookOutput::block("x");
        output.reason = None;
        assert_eq!(output.validate().len(), 1);
        assert!(StopHookOutput::block("continue").validate().is_empty());
        assert!(StopHookOutput::approve().validate().is_empty());
    }
}
