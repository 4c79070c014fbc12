//! In-memory `HistorySource` used by the pipeline tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LettaApiError;
use crate::history::source::{HistorySource, MessageQuery, SortOrder};
use crate::letta::types::{Conversation, Message, MessageKind, ToolInvocation};

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .expect("valid test timestamp")
}

pub fn conversation(
    id: &str,
    summary: Option<&str>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
) -> Conversation {
    Conversation {
        id: id.to_string(),
        summary: summary.map(ToOwned::to_owned),
        created_at: Some(created),
        updated_at: Some(updated),
    }
}

pub fn message(id: &str, date: DateTime<Utc>, kind: MessageKind) -> Message {
    Message {
        id: id.to_string(),
        date: Some(date),
        kind,
    }
}

pub fn undated(id: &str, kind: MessageKind) -> Message {
    Message {
        id: id.to_string(),
        date: None,
        kind,
    }
}

pub fn user(text: &str) -> MessageKind {
    MessageKind::User {
        text: text.to_string(),
    }
}

pub fn assistant(text: &str) -> MessageKind {
    MessageKind::Assistant {
        text: text.to_string(),
    }
}

pub fn reasoning(text: &str) -> MessageKind {
    MessageKind::Reasoning {
        text: text.to_string(),
    }
}

pub fn tool_call(name: &str, arguments: serde_json::Value) -> MessageKind {
    MessageKind::ToolCall {
        calls: vec![ToolInvocation {
            name: name.to_string(),
            arguments: Some(arguments),
        }],
    }
}

pub fn other(message_type: &str) -> MessageKind {
    MessageKind::Other {
        message_type: message_type.to_string(),
    }
}

/// Serves conversations and messages from memory with the remote service's
/// ordering and `before` cursor semantics.
#[derive(Default)]
pub struct FakeHistory {
    conversations: Vec<Conversation>,
    messages: BTreeMap<String, Vec<Message>>,
    failing_conversations: BTreeSet<String>,
    fail_listing: bool,
    fail_messages: bool,
    /// Serve at most this many messages per page, whatever the requested limit.
    page_cap: Option<usize>,
    ignore_cursor: bool,
    /// Number of cooperative yields per page request, keyed by conversation.
    yields: BTreeMap<String, usize>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<MessageQuery>>,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversation(mut self, conversation: Conversation, messages: Vec<Message>) -> Self {
        self.messages.insert(conversation.id.clone(), messages);
        self.conversations.push(conversation);
        self
    }

    pub fn failing_conversation(mut self, id: &str) -> Self {
        self.failing_conversations.insert(id.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_messages(mut self) -> Self {
        self.fail_messages = true;
        self
    }

    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    /// Answer every page as if no `before` cursor had been sent.
    pub fn ignoring_cursor(mut self) -> Self {
        self.ignore_cursor = true;
        self
    }

    pub fn with_yields(mut self, conversation_id: &str, yields: usize) -> Self {
        self.yields.insert(conversation_id.to_string(), yields);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<MessageQuery> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn error(what: &str) -> LettaApiError {
        LettaApiError::Status {
            url: format!("fake://{what}"),
            status: 500,
            body: "injected failure".to_string(),
        }
    }

    fn page(&self, query: &MessageQuery) -> Vec<Message> {
        let mut pool: Vec<Message> = match &query.conversation_id {
            Some(id) => self.messages.get(id).cloned().unwrap_or_default(),
            None => self.messages.values().flatten().cloned().collect(),
        };
        pool.sort_by_key(|m| (m.date, m.id.clone()));
        if query.order == SortOrder::Desc {
            pool.reverse();
        }
        if let Some(before) = query.before.as_ref().filter(|_| !self.ignore_cursor)
            && let Some(pos) = pool.iter().position(|m| &m.id == before)
        {
            pool = pool.split_off(pos + 1);
        }
        pool.truncate(self.page_cap.map_or(query.limit, |cap| cap.min(query.limit)));
        pool
    }
}

#[async_trait]
impl HistorySource for FakeHistory {
    async fn list_conversations(&self, _agent_id: &str) -> Result<Vec<Conversation>, LettaApiError> {
        if self.fail_listing {
            return Err(Self::error("conversations"));
        }
        Ok(self.conversations.clone())
    }

    async fn list_messages(
        &self,
        _agent_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, LettaApiError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(query.clone());
        if self.fail_messages {
            return Err(Self::error("messages"));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let yields = query
            .conversation_id
            .as_ref()
            .and_then(|id| self.yields.get(id))
            .copied()
            .unwrap_or(1);
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(id) = &query.conversation_id
            && self.failing_conversations.contains(id)
        {
            return Err(Self::error(id));
        }
        Ok(self.page(query))
    }
}
