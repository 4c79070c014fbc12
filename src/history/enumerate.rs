use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::history::source::HistorySource;
use crate::letta::types::Conversation;

fn sort_by_recency(conversations: &mut [Conversation]) {
    let key = |c: &Conversation| c.updated_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    conversations.sort_by(|a, b| key(b).cmp(&key(a)));
}

/// Most recently updated conversations first, capped at `cap`. A failed
/// listing aborts the run.
pub async fn enumerate_conversations<S>(
    source: &S,
    agent_id: &str,
    cap: usize,
) -> Result<Vec<Conversation>>
where
    S: HistorySource + ?Sized,
{
    let mut conversations = source
        .list_conversations(agent_id)
        .await
        .with_context(|| format!("failed to list conversations for agent {agent_id}"))?;
    let listed = conversations.len();
    sort_by_recency(&mut conversations);
    conversations.truncate(cap);
    tracing::info!(listed, kept = conversations.len(), cap, "enumerated conversations");
    Ok(conversations)
}

#[cfg(test)]
mod tests {
    use super::enumerate_conversations;
    use crate::history::testing::{FakeHistory, at, conversation};
    use crate::letta::types::Conversation;

    #[tokio::test]
    async fn sorts_newest_first_and_caps() {
        let fake = FakeHistory::new()
            .with_conversation(
                conversation("old", None, at(2025, 1, 1, 0, 0), at(2025, 2, 1, 0, 0)),
                Vec::new(),
            )
            .with_conversation(
                conversation("new", None, at(2025, 1, 1, 0, 0), at(2026, 2, 1, 0, 0)),
                Vec::new(),
            )
            .with_conversation(
                conversation("mid", None, at(2025, 1, 1, 0, 0), at(2025, 9, 1, 0, 0)),
                Vec::new(),
            );

        let got = enumerate_conversations(&fake, "agent-1", 2)
            .await
            .expect("enumerate");
        let ids = got.iter().map(|c| c.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn missing_updated_at_sorts_last() {
        let undated = Conversation {
            id: "undated".to_string(),
            summary: None,
            created_at: None,
            updated_at: None,
        };
        let fake = FakeHistory::new()
            .with_conversation(undated, Vec::new())
            .with_conversation(
                conversation("dated", None, at(2025, 1, 1, 0, 0), at(2025, 1, 2, 0, 0)),
                Vec::new(),
            );

        let got = enumerate_conversations(&fake, "agent-1", 50)
            .await
            .expect("enumerate");
        let ids = got.iter().map(|c| c.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["dated", "undated"]);
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let fake = FakeHistory::new().failing_listing();
        let err = enumerate_conversations(&fake, "agent-1", 50)
            .await
            .expect_err("should fail");
        assert!(format!("{err:#}").contains("failed to list conversations for agent agent-1"));
    }
}
