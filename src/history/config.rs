use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::letta::credentials::letta_home;

/// Page, character and per-type budgets for one chunk extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractLimits {
    pub page_limit: usize,
    pub max_pages_per_chunk: usize,
    pub max_output_chars: usize,
    pub assistant_chars: usize,
    pub reasoning_chars: usize,
    pub tool_call_chars: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            page_limit: 100,
            max_pages_per_chunk: 3,
            max_output_chars: 200_000,
            assistant_chars: 500,
            reasoning_chars: 200,
            tool_call_chars: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    pub months: u32,
    pub max_conversations: usize,
    pub concurrency: usize,
    pub request_timeout_secs: u64,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            months: 1,
            max_conversations: 50,
            concurrency: 10,
            request_timeout_secs: 45,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChunkerConfig {
    pub limits: ExtractLimits,
    pub run: RunDefaults,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialChunkerConfig {
    limits: Option<ExtractLimits>,
    run: Option<RunDefaults>,
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

pub fn validate(cfg: &ChunkerConfig) -> Result<()> {
    let limits = &cfg.limits;
    if limits.page_limit == 0 {
        return Err(anyhow!("invalid page limit: must be >= 1"));
    }
    if limits.max_pages_per_chunk == 0 {
        return Err(anyhow!("invalid max pages per chunk: must be >= 1"));
    }
    if limits.max_output_chars == 0 {
        return Err(anyhow!("invalid max output chars: must be >= 1"));
    }
    if limits.assistant_chars == 0 || limits.reasoning_chars == 0 || limits.tool_call_chars == 0 {
        return Err(anyhow!(
            "invalid per-type truncation limits: assistant, reasoning and tool call limits must be >= 1"
        ));
    }
    if cfg.run.months == 0 {
        return Err(anyhow!("invalid lookback: months must be >= 1"));
    }
    if cfg.run.max_conversations == 0 {
        return Err(anyhow!("invalid max conversations: must be >= 1"));
    }
    if cfg.run.concurrency == 0 {
        return Err(anyhow!("invalid concurrency: must be >= 1"));
    }
    if cfg.run.request_timeout_secs == 0 {
        return Err(anyhow!("invalid request timeout: must be >= 1 second"));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("LETTA_HISTORY_CONFIG") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    Some(letta_home()?.join("history-chunker.toml"))
}

fn merge_file_config(base: &mut ChunkerConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| ConfigError::InvalidConfig(format!("{}: {err}", path.display())))?;
    let parsed: PartialChunkerConfig = toml::from_str(&raw)
        .map_err(|err| ConfigError::InvalidConfig(format!("{}: {err}", path.display())))?;
    if let Some(limits) = parsed.limits {
        base.limits = limits;
    }
    if let Some(run) = parsed.run {
        base.run = run;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut ChunkerConfig) {
    let limits = &mut cfg.limits;
    limits.page_limit = env_or_usize("LETTA_HISTORY_PAGE_LIMIT", limits.page_limit);
    limits.max_pages_per_chunk = env_or_usize("LETTA_HISTORY_MAX_PAGES", limits.max_pages_per_chunk);
    limits.max_output_chars =
        env_or_usize("LETTA_HISTORY_MAX_OUTPUT_CHARS", limits.max_output_chars);
    limits.assistant_chars = env_or_usize("LETTA_HISTORY_ASSISTANT_CHARS", limits.assistant_chars);
    limits.reasoning_chars = env_or_usize("LETTA_HISTORY_REASONING_CHARS", limits.reasoning_chars);
    limits.tool_call_chars = env_or_usize("LETTA_HISTORY_TOOL_CALL_CHARS", limits.tool_call_chars);

    let run = &mut cfg.run;
    run.months = env_or_u32("LETTA_HISTORY_MONTHS", run.months);
    run.max_conversations = env_or_usize("LETTA_HISTORY_MAX_CONVERSATIONS", run.max_conversations);
    run.concurrency = env_or_usize("LETTA_HISTORY_CONCURRENCY", run.concurrency);
    run.request_timeout_secs = env_or_u64("LETTA_HISTORY_TIMEOUT_SECS", run.request_timeout_secs);
}

/// Defaults, then the TOML file, then `LETTA_HISTORY_*` variables. CLI flags
/// are layered on top by the caller, which must call [`validate`] afterwards.
pub fn load_config() -> Result<ChunkerConfig> {
    let mut cfg = ChunkerConfig::default();
    if let Some(path) = resolve_config_path() {
        merge_file_config(&mut cfg, &path)?;
    }
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}
