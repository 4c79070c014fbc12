use chrono::{DateTime, Utc};

use crate::history::buckets::DateRange;
use crate::history::source::{HistorySource, MessageQuery, SortOrder};

async fn boundary<S>(source: &S, agent_id: &str, order: SortOrder) -> Option<DateTime<Utc>>
where
    S: HistorySource + ?Sized,
{
    let query = MessageQuery {
        limit: 1,
        order,
        conversation_id: None,
        before: None,
    };
    match source.list_messages(agent_id, &query).await {
        Ok(page) => page.first().and_then(|m| m.date),
        Err(err) => {
            tracing::warn!(order = order.as_str(), error = %err, "range probe failed");
            None
        }
    }
}

/// Oldest and newest message dates across the agent's whole history, or
/// `None` when there is no history (or it cannot be probed).
pub async fn probe_range<S>(source: &S, agent_id: &str) -> Option<DateRange>
where
    S: HistorySource + ?Sized,
{
    let (oldest, newest) = futures::join!(
        boundary(source, agent_id, SortOrder::Asc),
        boundary(source, agent_id, SortOrder::Desc),
    );
    let range = DateRange {
        oldest: oldest?,
        newest: newest?,
    };
    tracing::info!(oldest = %range.oldest, newest = %range.newest, "probed history range");
    Some(range)
}
