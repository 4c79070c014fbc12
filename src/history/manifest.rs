use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::history::buckets::{BucketPlan, DateRange};
use crate::history::chunk::ChunkResult;
use crate::history::plan::{PlannedItem, WorkItem};
use crate::history::scheduler::{BatchOutcome, ChunkFailure};

pub const NO_MESSAGES: &str = "No messages found";

#[derive(Debug, Clone, Serialize)]
pub struct ManifestRange {
    pub oldest: String,
    pub newest: String,
}

impl From<&DateRange> for ManifestRange {
    fn from(range: &DateRange) -> Self {
        Self {
            oldest: timestamp(range.oldest),
            newest: timestamp(range.newest),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub agent_id: String,
    pub output_dir: String,
    pub generated_at: String,
    pub months: u32,
    pub date_range: ManifestRange,
    pub conversations: usize,
    pub monthly_buckets: Vec<String>,
    pub chunks_produced: usize,
    pub chunks: Vec<ChunkResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ChunkFailure>,
}

/// Emitted when the agent has no probe-able history.
#[derive(Debug, Clone, Serialize)]
pub struct EmptyManifest {
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    pub generated_at: String,
    pub chunks: Vec<ChunkResult>,
    pub chunks_produced: usize,
    pub message: String,
}

/// `--dry-run` output: what would be extracted, without fetching messages.
#[derive(Debug, Clone, Serialize)]
pub struct WorkPlan {
    pub agent_id: String,
    pub dry_run: bool,
    pub months: u32,
    pub date_range: ManifestRange,
    pub conversations: usize,
    pub monthly_buckets: Vec<String>,
    pub work_items: usize,
    pub items: Vec<PlannedItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RunOutput {
    Manifest(Manifest),
    Empty(EmptyManifest),
    Plan(WorkPlan),
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn bucket_labels(plan: &BucketPlan) -> Vec<String> {
    plan.buckets.iter().map(|b| b.label.clone()).collect()
}

pub struct ManifestInput<'a> {
    pub agent_id: &'a str,
    pub output_dir: &'a str,
    pub months: u32,
    pub conversations: usize,
    pub plan: &'a BucketPlan,
    pub batch: BatchOutcome,
    pub generated_at: DateTime<Utc>,
}

pub fn build_manifest(input: ManifestInput<'_>) -> Manifest {
    let chunks = input.batch.chunks;
    Manifest {
        agent_id: input.agent_id.to_string(),
        output_dir: input.output_dir.to_string(),
        generated_at: timestamp(input.generated_at),
        months: input.months,
        date_range: ManifestRange::from(&input.plan.range),
        conversations: input.conversations,
        monthly_buckets: bucket_labels(input.plan),
        chunks_produced: chunks.len(),
        chunks,
        failures: input.batch.failures,
    }
}

pub fn empty_manifest(agent_id: &str, output_dir: Option<&str>, generated_at: DateTime<Utc>) -> EmptyManifest {
    EmptyManifest {
        agent_id: agent_id.to_string(),
        output_dir: output_dir.map(ToOwned::to_owned),
        generated_at: timestamp(generated_at),
        chunks: Vec::new(),
        chunks_produced: 0,
        message: NO_MESSAGES.to_string(),
    }
}

pub fn work_plan(
    agent_id: &str,
    months: u32,
    conversations: usize,
    plan: &BucketPlan,
    items: &[WorkItem],
) -> WorkPlan {
    WorkPlan {
        agent_id: agent_id.to_string(),
        dry_run: true,
        months,
        date_range: ManifestRange::from(&plan.range),
        conversations,
        monthly_buckets: bucket_labels(plan),
        work_items: items.len(),
        items: items.iter().map(PlannedItem::from).collect(),
    }
}
