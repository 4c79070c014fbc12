use async_trait::async_trait;

use crate::error::LettaApiError;
use crate::letta::types::{Conversation, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub limit: usize,
    pub order: SortOrder,
    pub conversation_id: Option<String>,
    /// Id of the oldest message already seen; the page continues strictly before it.
    pub before: Option<String>,
}

/// Read-only view of an agent's remote conversation history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn list_conversations(&self, agent_id: &str) -> Result<Vec<Conversation>, LettaApiError>;

    /// Return up to `query.limit` messages in `query.order`.
    async fn list_messages(
        &self,
        agent_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, LettaApiError>;
}
