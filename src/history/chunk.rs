use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::error::LettaApiError;
use crate::history::buckets::TimeBucket;
use crate::history::config::ExtractLimits;
use crate::history::format::format_line;
use crate::history::source::{HistorySource, MessageQuery, SortOrder};
use crate::history::util::{short_hash, slugify};

const MAX_SLUG_CHARS: usize = 40;
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct ChunkRequest<'a> {
    pub agent_id: &'a str,
    pub conversation_id: &'a str,
    pub conversation_label: &'a str,
    pub bucket: &'a TimeBucket,
    pub output_dir: &'a Path,
    pub limits: &'a ExtractLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkResult {
    pub file: String,
    pub conversation_id: String,
    pub conversation_label: String,
    pub time_label: String,
    pub messages_kept: usize,
    pub total_scanned: usize,
    pub truncated: bool,
    pub page_limit_reached: bool,
}

/// Lines collected for one bucket, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub lines: Vec<String>,
    pub messages_kept: usize,
    pub total_scanned: usize,
    pub truncated: bool,
    pub page_limit_reached: bool,
}

pub fn chunk_file_name(conversation_label: &str, conversation_id: &str, time_label: &str) -> String {
    format!(
        "{}-{}-{}.txt",
        slugify(conversation_label, MAX_SLUG_CHARS),
        short_hash(conversation_id, 8),
        time_label
    )
}

fn render_header(request: &ChunkRequest<'_>, kept: usize, scanned: usize, truncated: bool) -> String {
    let bucket = request.bucket;
    let mut header = String::new();
    header.push_str("# Letta conversation history chunk\n");
    header.push_str(&format!("# Agent: {}\n", request.agent_id));
    header.push_str(&format!(
        "# Conversation: {} ({})\n",
        request.conversation_label, request.conversation_id
    ));
    header.push_str(&format!(
        "# Date range: {} to {} ({}, end exclusive)\n",
        bucket.start.format(DATE_FORMAT),
        bucket.end.format(DATE_FORMAT),
        bucket.label
    ));
    header.push_str(&format!("# Messages: {kept} of {scanned} scanned"));
    if truncated {
        header.push_str(" [TRUNCATED]");
    }
    header.push_str("\n\n");
    header
}

fn render_footer(limits: &ExtractLimits) -> String {
    format!(
        "\n[TRUNCATED] Output limit of {} characters reached; older messages in this window were omitted.\n",
        limits.max_output_chars
    )
}

pub fn render_chunk(request: &ChunkRequest<'_>, outcome: &ScanOutcome) -> String {
    let mut text = render_header(
        request,
        outcome.messages_kept,
        outcome.total_scanned,
        outcome.truncated,
    );
    for line in &outcome.lines {
        text.push_str(line);
        text.push('\n');
    }
    if outcome.truncated {
        text.push_str(&render_footer(request.limits));
    }
    text
}

/// Page backwards through one conversation, keeping the messages that fall
/// inside the bucket. Pages may hold fewer than `page_limit` messages, so only
/// an empty page, a stalled cursor, the start boundary, the page cap or the
/// character budget ends the scan.
pub async fn scan_bucket<S>(source: &S, request: &ChunkRequest<'_>) -> Result<ScanOutcome, LettaApiError>
where
    S: HistorySource + ?Sized,
{
    let limits = request.limits;
    let bucket = request.bucket;

    let mut outcome = ScanOutcome::default();
    let mut used_chars = render_header(request, 0, 0, false).chars().count();
    let mut cursor: Option<String> = None;
    let mut pages_read = 0usize;

    'pages: loop {
        if pages_read >= limits.max_pages_per_chunk {
            outcome.page_limit_reached = true;
            break;
        }

        let query = MessageQuery {
            limit: limits.page_limit,
            order: SortOrder::Desc,
            conversation_id: Some(request.conversation_id.to_string()),
            before: cursor.clone(),
        };
        let page = source.list_messages(request.agent_id, &query).await?;
        pages_read += 1;
        if page.is_empty() {
            break;
        }

        for message in &page {
            // Undated messages belong to no bucket.
            let Some(date) = message.date else {
                continue;
            };
            if date >= bucket.end {
                continue;
            }
            if date < bucket.start {
                break 'pages;
            }

            outcome.total_scanned += 1;
            let Some(line) = format_line(&message.kind, date, limits) else {
                tracing::trace!(id = %message.id, kind = message.kind.type_name(), "discarded");
                continue;
            };
            let cost = line.chars().count() + 1;
            if used_chars + cost > limits.max_output_chars {
                outcome.truncated = true;
                break 'pages;
            }
            used_chars += cost;
            outcome.messages_kept += 1;
            outcome.lines.push(line);
        }

        let next_cursor = page
            .last()
            .map(|m| m.id.clone())
            .filter(|id| !id.is_empty());
        match next_cursor {
            Some(id) if cursor.as_deref() != Some(id.as_str()) => cursor = Some(id),
            _ => break,
        }
    }

    outcome.lines.reverse();
    Ok(outcome)
}

/// Extract one (conversation, bucket) pair. Writes the chunk file and
/// returns its result only when at least one message was kept.
pub async fn extract_chunk<S>(source: &S, request: &ChunkRequest<'_>) -> Result<Option<ChunkResult>>
where
    S: HistorySource + ?Sized,
{
    let outcome = scan_bucket(source, request).await.with_context(|| {
        format!(
            "failed to read messages for conversation {} in {}",
            request.conversation_id, request.bucket.label
        )
    })?;

    if outcome.messages_kept == 0 {
        tracing::debug!(
            conversation = request.conversation_id,
            bucket = %request.bucket.label,
            scanned = outcome.total_scanned,
            "no retainable messages"
        );
        return Ok(None);
    }

    let file_name = chunk_file_name(
        request.conversation_label,
        request.conversation_id,
        &request.bucket.label,
    );
    let path = request.output_dir.join(file_name);
    tokio::fs::write(&path, render_chunk(request, &outcome))
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(
        file = %path.display(),
        kept = outcome.messages_kept,
        scanned = outcome.total_scanned,
        truncated = outcome.truncated,
        "wrote chunk"
    );

    Ok(Some(ChunkResult {
        file: path.display().to_string(),
        conversation_id: request.conversation_id.to_string(),
        conversation_label: request.conversation_label.to_string(),
        time_label: request.bucket.label.clone(),
        messages_kept: outcome.messages_kept,
        total_scanned: outcome.total_scanned,
        truncated: outcome.truncated,
        page_limit_reached: outcome.page_limit_reached,
    }))
}
