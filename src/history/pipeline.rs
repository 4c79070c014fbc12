use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::history::buckets::plan_buckets;
use crate::history::config::ExtractLimits;
use crate::history::enumerate::enumerate_conversations;
use crate::history::manifest::{
    ManifestInput, RunOutput, build_manifest, empty_manifest, work_plan,
};
use crate::history::plan::plan_work;
use crate::history::probe::probe_range;
use crate::history::scheduler::{ExtractContext, run_batch};
use crate::history::source::HistorySource;

const FRESH_DIR_PREFIX: &str = "letta-history-";

/// Where chunk files go. A fresh directory is only created once there is
/// work to write, so failed and dry runs leave nothing behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDir {
    Given(PathBuf),
    FreshIn(PathBuf),
}

impl OutputDir {
    fn requested(&self) -> Option<&Path> {
        match self {
            OutputDir::Given(path) => Some(path),
            OutputDir::FreshIn(_) => None,
        }
    }

    async fn prepare(&self) -> Result<PathBuf> {
        match self {
            OutputDir::Given(path) => {
                tokio::fs::create_dir_all(path)
                    .await
                    .with_context(|| format!("failed to create output dir {}", path.display()))?;
                Ok(path.clone())
            }
            OutputDir::FreshIn(parent) => {
                let dir = tempfile::Builder::new()
                    .prefix(FRESH_DIR_PREFIX)
                    .tempdir_in(parent)
                    .with_context(|| {
                        format!("failed to create an output dir in {}", parent.display())
                    })?;
                Ok(dir.keep())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub agent_id: String,
    pub output_dir: OutputDir,
    pub months: u32,
    pub max_conversations: usize,
    pub concurrency: usize,
    pub limits: ExtractLimits,
    pub dry_run: bool,
}

/// Enumerate, probe, plan, extract and summarize one agent's history.
pub async fn run_pipeline<S>(source: &S, input: &PipelineInput) -> Result<RunOutput>
where
    S: HistorySource + ?Sized,
{
    let agent_id = input.agent_id.as_str();
    let output_label = input
        .output_dir
        .requested()
        .map(|p| p.display().to_string());

    let conversations = enumerate_conversations(source, agent_id, input.max_conversations).await?;

    let Some(range) = probe_range(source, agent_id).await else {
        tracing::info!(agent = agent_id, "no messages found");
        return Ok(RunOutput::Empty(empty_manifest(
            agent_id,
            output_label.as_deref(),
            Utc::now(),
        )));
    };

    let plan = plan_buckets(range.oldest, range.newest, input.months);
    let items = plan_work(&conversations, &plan.buckets);
    tracing::info!(
        conversations = conversations.len(),
        buckets = plan.buckets.len(),
        items = items.len(),
        "planned work"
    );

    if input.dry_run {
        return Ok(RunOutput::Plan(work_plan(
            agent_id,
            input.months,
            conversations.len(),
            &plan,
            &items,
        )));
    }

    let output_dir = input.output_dir.prepare().await?;
    tracing::info!(output_dir = %output_dir.display(), "writing chunks");

    let ctx = ExtractContext {
        agent_id: input.agent_id.clone(),
        output_dir: output_dir.clone(),
        limits: input.limits.clone(),
    };
    let batch = run_batch(source, &ctx, &items, input.concurrency).await;

    Ok(RunOutput::Manifest(build_manifest(ManifestInput {
        agent_id,
        output_dir: &output_dir.display().to_string(),
        months: input.months,
        conversations: conversations.len(),
        plan: &plan,
        batch,
        generated_at: Utc::now(),
    })))
}
