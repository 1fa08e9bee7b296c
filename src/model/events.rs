//! Event protocol emitted by a screening run
//!
//! A run yields any number of `status` / `tool_call` / `tool_result` / `delta`
//! events followed by exactly one `complete` or `error`. Consumers must treat
//! the stream as ordered and append-only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::screening::CompleteData;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScreeningEvent {
    /// Human-readable progress note
    Status { message: String },
    /// A tool is about to run with these arguments
    ToolCall { tool: String, args: Value },
    /// A tool finished; `id` is the citation ID of its last result
    ToolResult {
        tool: String,
        id: String,
        count: usize,
    },
    /// Narrative text
    Delta { content: String },
    /// Terminal: full structured verdict
    Complete { data: CompleteData },
    /// Terminal: the run failed
    Error { message: String },
}

impl ScreeningEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScreeningEvent::Complete { .. } | ScreeningEvent::Error { .. }
        )
    }

    /// Serialize as one SSE `data:` line
    pub fn to_sse_frame(&self) -> String {
        // Serialization of these shapes cannot fail; fall back to an error
        // frame rather than panicking if it somehow does.
        let json = serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"type":"error","message":"{}"}}"#, e));
        format!("data: {}\n\n", json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_with_snake_case_type() {
        let event = ScreeningEvent::ToolResult {
            tool: "web_search".to_string(),
            id: "web3".to_string(),
            count: 3,
        };
        let json: Value = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["id"], "web3");
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn sse_frame_is_data_prefixed() {
        let event = ScreeningEvent::Status {
            message: "Starting verification".to_string(),
        };
        let frame = event.to_sse_frame();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn terminal_detection() {
        assert!(ScreeningEvent::Error {
            message: "boom".into()
        }
        .is_terminal());
        assert!(!ScreeningEvent::Delta {
            content: "text".into()
        }
        .is_terminal());
    }
}
