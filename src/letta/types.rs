use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One message from the remote history, decoded once at the client boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawMessage")]
pub struct Message {
    pub id: String,
    pub date: Option<DateTime<Utc>>,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    User { text: String },
    Assistant { text: String },
    Reasoning { text: String },
    ToolCall { calls: Vec<ToolInvocation> },
    Other { message_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Option<Value>,
}

impl MessageKind {
    pub fn type_name(&self) -> &str {
        match self {
            MessageKind::User { .. } => "user_message",
            MessageKind::Assistant { .. } => "assistant_message",
            MessageKind::Reasoning { .. } => "reasoning_message",
            MessageKind::ToolCall { .. } => "tool_call_message",
            MessageKind::Other { message_type } => message_type,
        }
    }
}

/// Parse the timestamp shapes the server has been seen to emit: RFC 3339 with
/// an offset, or a naive ISO timestamp that is implicitly UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    content: Option<RawContent>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_call: Option<RawToolCall>,
    #[serde(default)]
    tool_calls: Option<Vec<RawToolCall>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Parts(Vec<RawContentPart>),
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct RawContentPart {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
    #[serde(default)]
    function: Option<RawFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct RawFunctionCall {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
}

impl RawContent {
    fn into_text(self) -> String {
        match self {
            RawContent::Text(text) => text,
            RawContent::Parts(parts) => parts
                .into_iter()
                .filter(|part| part.kind.as_deref().is_none_or(|kind| kind == "text"))
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("\n"),
            RawContent::Other(_) => String::new(),
        }
    }
}

impl RawToolCall {
    fn into_invocation(self) -> Option<ToolInvocation> {
        let (nested_name, nested_args) = match self.function {
            Some(function) => (function.name, function.arguments),
            None => (None, None),
        };
        let name = self
            .name
            .or(nested_name)
            .filter(|name| !name.trim().is_empty())?;
        Some(ToolInvocation {
            name,
            arguments: self.arguments.or(nested_args),
        })
    }
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        let text = || raw.content.map(RawContent::into_text).unwrap_or_default();
        let message_type = raw.message_type.clone().unwrap_or_default();
        let kind = match message_type.as_str() {
            "user_message" => MessageKind::User { text: text() },
            "assistant_message" => MessageKind::Assistant { text: text() },
            "reasoning_message" => MessageKind::Reasoning {
                text: raw.reasoning.unwrap_or_default(),
            },
            "tool_call_message" => {
                let calls = raw
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .chain(raw.tool_call)
                    .filter_map(RawToolCall::into_invocation)
                    .collect();
                MessageKind::ToolCall { calls }
            }
            _ => MessageKind::Other { message_type },
        };
        Message {
            id: raw.id,
            date: raw.date.as_deref().and_then(parse_timestamp),
            kind,
        }
    }
}
