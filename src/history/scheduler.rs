use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;

use crate::history::chunk::{ChunkRequest, ChunkResult, extract_chunk};
use crate::history::config::ExtractLimits;
use crate::history::plan::WorkItem;
use crate::history::source::HistorySource;

/// Shared inputs for every extraction in a batch.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub agent_id: String,
    pub output_dir: PathBuf,
    pub limits: ExtractLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub conversation_id: String,
    pub conversation_label: String,
    pub time_label: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub chunks: Vec<ChunkResult>,
    pub failures: Vec<ChunkFailure>,
}

enum ItemOutcome {
    Written(ChunkResult),
    Empty,
    Failed(ChunkFailure),
}

async fn run_item<S>(source: &S, ctx: &ExtractContext, item: &WorkItem) -> ItemOutcome
where
    S: HistorySource + ?Sized,
{
    let request = ChunkRequest {
        agent_id: &ctx.agent_id,
        conversation_id: &item.conversation.id,
        conversation_label: &item.conversation_label,
        bucket: &item.bucket,
        output_dir: &ctx.output_dir,
        limits: &ctx.limits,
    };
    match extract_chunk(source, &request).await {
        Ok(Some(chunk)) => ItemOutcome::Written(chunk),
        Ok(None) => ItemOutcome::Empty,
        Err(err) => {
            tracing::warn!(
                conversation = %item.conversation.id,
                bucket = %item.bucket.label,
                error = %format!("{err:#}"),
                "chunk extraction failed"
            );
            ItemOutcome::Failed(ChunkFailure {
                conversation_id: item.conversation.id.clone(),
                conversation_label: item.conversation_label.clone(),
                time_label: item.bucket.label.clone(),
                error: format!("{err:#}"),
            })
        }
    }
}

/// Run every work item with at most `concurrency` extractions in flight.
/// Results come back in input order; one item failing never stops the rest.
pub async fn run_batch<S>(
    source: &S,
    ctx: &ExtractContext,
    items: &[WorkItem],
    concurrency: usize,
) -> BatchOutcome
where
    S: HistorySource + ?Sized,
{
    let limit = concurrency.max(1);
    tracing::info!(items = items.len(), concurrency = limit, "starting extraction batch");

    let outcomes = stream::iter(items)
        .map(|item| run_item(source, ctx, item))
        .buffered(limit)
        .collect::<Vec<_>>()
        .await;

    let mut batch = BatchOutcome::default();
    for outcome in outcomes {
        match outcome {
            ItemOutcome::Written(chunk) => batch.chunks.push(chunk),
            ItemOutcome::Empty => {}
            ItemOutcome::Failed(failure) => batch.failures.push(failure),
        }
    }
    tracing::info!(
        chunks = batch.chunks.len(),
        failures = batch.failures.len(),
        "extraction batch finished"
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::{ExtractContext, run_batch};
    use crate::history::buckets::plan_buckets;
    use crate::history::config::ExtractLimits;
    use crate::history::plan::plan_work;
    use crate::history::testing::{FakeHistory, at, conversation, message, user};
    use tempfile::tempdir;

    fn context(dir: &std::path::Path) -> ExtractContext {
        ExtractContext {
            agent_id: "agent-1".to_string(),
            output_dir: dir.to_path_buf(),
            limits: ExtractLimits::default(),
        }
    }

    fn fake_with(ids: &[&str]) -> FakeHistory {
        ids.iter().fold(FakeHistory::new(), |fake, id| {
            fake.with_conversation(
                conversation(id, None, at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0)),
                vec![message(&format!("{id}-m"), at(2026, 2, 10, 0, 0), user(id))],
            )
        })
    }

    #[tokio::test]
    async fn never_exceeds_the_concurrency_limit() {
        let ids = (0..12).map(|i| format!("conv-{i:02}")).collect::<Vec<_>>();
        let refs = ids.iter().map(String::as_str).collect::<Vec<_>>();
        let fake = refs
            .iter()
            .fold(fake_with(&refs), |fake, id| fake.with_yields(id, 5));
        let conversations = refs
            .iter()
            .map(|id| conversation(id, None, at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0)))
            .collect::<Vec<_>>();
        let plan = plan_buckets(at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0), 1);
        let items = plan_work(&conversations, &plan.buckets);
        let tmp = tempdir().expect("tempdir");

        let batch = run_batch(&fake, &context(tmp.path()), &items, 3).await;
        assert_eq!(batch.chunks.len(), 12);
        assert!(batch.failures.is_empty());
        assert!(fake.max_in_flight() <= 3);
        assert!(fake.max_in_flight() >= 2);
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let fake = fake_with(&["slow", "fast"]).with_yields("slow", 50);
        let conversations = vec![
            conversation("slow", None, at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0)),
            conversation("fast", None, at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0)),
        ];
        let plan = plan_buckets(at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0), 1);
        let items = plan_work(&conversations, &plan.buckets);
        let tmp = tempdir().expect("tempdir");

        let batch = run_batch(&fake, &context(tmp.path()), &items, 4).await;
        let ids = batch
            .chunks
            .iter()
            .map(|c| c.conversation_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn one_failing_item_does_not_stop_the_batch() {
        let fake = fake_with(&["a", "broken", "c"]).failing_conversation("broken");
        let conversations = ["a", "broken", "c"]
            .iter()
            .map(|id| conversation(id, None, at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0)))
            .collect::<Vec<_>>();
        let plan = plan_buckets(at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0), 1);
        let items = plan_work(&conversations, &plan.buckets);
        let tmp = tempdir().expect("tempdir");

        let batch = run_batch(&fake, &context(tmp.path()), &items, 2).await;
        let ids = batch
            .chunks
            .iter()
            .map(|c| c.conversation_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].conversation_id, "broken");
        assert_eq!(batch.failures[0].time_label, "2026-feb");
        assert!(batch.failures[0].error.contains("HTTP 500"));
    }

    #[tokio::test]
    async fn zero_concurrency_still_makes_progress() {
        let fake = fake_with(&["a"]);
        let conversations = vec![conversation("a", None, at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0))];
        let plan = plan_buckets(at(2026, 2, 1, 0, 0), at(2026, 2, 20, 0, 0), 1);
        let items = plan_work(&conversations, &plan.buckets);
        let tmp = tempdir().expect("tempdir");

        let batch = run_batch(&fake, &context(tmp.path()), &items, 0).await;
        assert_eq!(batch.chunks.len(), 1);
        assert_eq!(fake.max_in_flight(), 1);
    }
}
