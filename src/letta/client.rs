use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::LettaApiError;
use crate::history::source::{HistorySource, MessageQuery};
use crate::history::util::truncate_with_ellipsis;
use crate::letta::credentials::Credentials;
use crate::letta::types::{Conversation, Message};

const MAX_ERROR_BODY_CHARS: usize = 300;

/// List endpoints answer with a bare array; some deployments wrap it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "conversations", alias = "messages", alias = "items")]
        data: Vec<T>,
    },
}

impl<T> ListEnvelope<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Bare(items) | ListEnvelope::Wrapped { data: items } => items,
        }
    }
}

pub struct LettaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LettaClient {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("history-chunker/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: credentials.base_url.clone(),
            api_key: credentials.api_key.clone(),
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, LettaApiError> {
        tracing::debug!(%url, ?query, "GET");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|source| LettaApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LettaApiError::Status {
                url,
                status: status.as_u16(),
                body: truncate_with_ellipsis(body.trim(), MAX_ERROR_BODY_CHARS),
            });
        }

        let envelope = response
            .json::<ListEnvelope<T>>()
            .await
            .map_err(|source| LettaApiError::Decode { url, source })?;
        Ok(envelope.into_vec())
    }
}

#[async_trait]
impl HistorySource for LettaClient {
    async fn list_conversations(&self, agent_id: &str) -> Result<Vec<Conversation>, LettaApiError> {
        let url = format!("{}/v1/conversations", self.base_url);
        self.get_list(url, &[("agent_id", agent_id.to_string())])
            .await
    }

    async fn list_messages(
        &self,
        agent_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, LettaApiError> {
        let url = format!("{}/v1/agents/{}/messages", self.base_url, agent_id);
        let mut params = vec![
            ("limit", query.limit.to_string()),
            ("order", query.order.as_str().to_string()),
        ];
        if let Some(conversation_id) = &query.conversation_id {
            params.push(("conversation_id", conversation_id.clone()));
        }
        if let Some(before) = &query.before {
            params.push(("before", before.clone()));
        }
        self.get_list(url, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::ListEnvelope;
    use crate::letta::types::Conversation;
    use serde_json::json;

    #[test]
    fn list_envelope_accepts_bare_and_wrapped_arrays() {
        let bare: ListEnvelope<Conversation> =
            serde_json::from_value(json!([{"id": "conv-1"}])).expect("bare");
        assert_eq!(bare.into_vec().len(), 1);

        let wrapped: ListEnvelope<Conversation> =
            serde_json::from_value(json!({"conversations": [{"id": "conv-1"}, {"id": "conv-2"}]}))
                .expect("wrapped");
        assert_eq!(wrapped.into_vec().len(), 2);
    }
}
