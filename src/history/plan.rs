use serde::Serialize;

use crate::history::buckets::TimeBucket;
use crate::history::util::{collapse_whitespace, truncate_with_ellipsis};
use crate::letta::types::Conversation;

const MAX_LABEL_CHARS: usize = 48;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub conversation: Conversation,
    pub conversation_label: String,
    pub bucket: TimeBucket,
}

/// Display label: the conversation summary when there is one, else its id.
pub fn conversation_label(conversation: &Conversation) -> String {
    let summary = conversation
        .summary
        .as_deref()
        .map(collapse_whitespace)
        .unwrap_or_default();
    if summary.is_empty() {
        conversation.id.clone()
    } else {
        truncate_with_ellipsis(&summary, MAX_LABEL_CHARS)
    }
}

/// Interval overlap between the conversation's lifetime and the bucket.
/// Missing timestamps are unbounded, so they never prune a pair.
pub fn may_overlap(conversation: &Conversation, bucket: &TimeBucket) -> bool {
    conversation
        .created_at
        .is_none_or(|created| created < bucket.end)
        && conversation
            .updated_at
            .is_none_or(|updated| updated >= bucket.start)
}

/// Conversation-major cross product of conversations and buckets, minus
/// pairs that provably cannot share a message.
pub fn plan_work(conversations: &[Conversation], buckets: &[TimeBucket]) -> Vec<WorkItem> {
    let mut items = Vec::new();
    for conversation in conversations {
        let label = conversation_label(conversation);
        for bucket in buckets {
            if may_overlap(conversation, bucket) {
                items.push(WorkItem {
                    conversation: conversation.clone(),
                    conversation_label: label.clone(),
                    bucket: bucket.clone(),
                });
            }
        }
    }
    items
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedItem {
    pub conversation_id: String,
    pub conversation_label: String,
    pub time_label: String,
}

impl From<&WorkItem> for PlannedItem {
    fn from(item: &WorkItem) -> Self {
        Self {
            conversation_id: item.conversation.id.clone(),
            conversation_label: item.conversation_label.clone(),
            time_label: item.bucket.label.clone(),
        }
    }
}
