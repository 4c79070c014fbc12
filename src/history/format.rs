use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::history::config::ExtractLimits;
use crate::history::util::{collapse_whitespace, truncate_with_ellipsis};
use crate::letta::types::{MessageKind, ToolInvocation};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn argument_preview(arguments: Option<&Value>) -> String {
    let compact = match arguments {
        None | Some(Value::Null) => return String::new(),
        // Arguments usually arrive as a JSON-encoded string.
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => parsed.to_string(),
            Err(_) => raw.clone(),
        },
        Some(other) => other.to_string(),
    };
    collapse_whitespace(&compact)
}

fn summarize_tool_calls(calls: &[ToolInvocation], max_chars: usize) -> String {
    if calls.is_empty() {
        return "(unnamed tool call)".to_string();
    }
    let summary = calls
        .iter()
        .map(|call| format!("{}({})", call.name, argument_preview(call.arguments.as_ref())))
        .collect::<Vec<_>>()
        .join("; ");
    truncate_with_ellipsis(&summary, max_chars)
}

/// One chunk line for a retained message kind, or `None` for kinds that are
/// scanned but never written.
pub fn format_line(kind: &MessageKind, date: DateTime<Utc>, limits: &ExtractLimits) -> Option<String> {
    let (tag, body) = match kind {
        MessageKind::User { text } => ("USER", collapse_whitespace(text)),
        MessageKind::Assistant { text } => (
            "ASSISTANT",
            truncate_with_ellipsis(&collapse_whitespace(text), limits.assistant_chars),
        ),
        MessageKind::Reasoning { text } => (
            "REASONING",
            truncate_with_ellipsis(&collapse_whitespace(text), limits.reasoning_chars),
        ),
        MessageKind::ToolCall { calls } => {
            ("TOOL_CALL", summarize_tool_calls(calls, limits.tool_call_chars))
        }
        MessageKind::Other { .. } => return None,
    };
    Some(format!("[{}] {tag}: {body}", date.format(TIMESTAMP_FORMAT)))
}
