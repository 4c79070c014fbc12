use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::history::config::{ChunkerConfig, load_config, validate};
use crate::history::manifest::RunOutput;
use crate::history::pipeline::{OutputDir, PipelineInput, run_pipeline};
use crate::letta::client::LettaClient;
use crate::letta::credentials::resolve_credentials;

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub output_dir: Option<PathBuf>,
    pub months: Option<u32>,
    pub max_conversations: Option<usize>,
    pub concurrency: Option<usize>,
    pub agent_id: Option<String>,
    pub dry_run: bool,
}

fn apply_flags(cfg: &mut ChunkerConfig, opts: &ExtractOptions) {
    if let Some(months) = opts.months {
        cfg.run.months = months;
    }
    if let Some(max) = opts.max_conversations {
        cfg.run.max_conversations = max;
    }
    if let Some(concurrency) = opts.concurrency {
        cfg.run.concurrency = concurrency;
    }
}

fn output_target(opts: &ExtractOptions) -> OutputDir {
    match &opts.output_dir {
        Some(dir) => OutputDir::Given(dir.clone()),
        None => OutputDir::FreshIn(env::temp_dir()),
    }
}

pub async fn run(opts: &ExtractOptions) -> Result<RunOutput> {
    let credentials = resolve_credentials(opts.agent_id.as_deref())?;

    let mut cfg = load_config()?;
    apply_flags(&mut cfg, opts);
    validate(&cfg)?;

    let client = LettaClient::new(
        &credentials,
        Duration::from_secs(cfg.run.request_timeout_secs),
    )?;
    let output_dir = output_target(opts);
    tracing::info!(
        agent = %credentials.agent_id,
        base_url = %credentials.base_url,
        output_dir = ?output_dir,
        months = cfg.run.months,
        "starting history extraction"
    );

    let input = PipelineInput {
        agent_id: credentials.agent_id.clone(),
        output_dir,
        months: cfg.run.months,
        max_conversations: cfg.run.max_conversations,
        concurrency: cfg.run.concurrency,
        limits: cfg.limits,
        dry_run: opts.dry_run,
    };
    run_pipeline(&client, &input).await
}
