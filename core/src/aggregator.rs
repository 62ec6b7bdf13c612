/// Conversation list aggregation.
///
/// Builds the sidebar for one user: visible conversations, the masked
/// identity of each counterpart, last message preview and unread count,
/// newest activity first. Profiles, last messages and unread counts are each
/// fetched in one batch for the whole list.
use crate::backend::ChatBackend;
use crate::error::Result;
use crate::masking::{business_identity, courier_identity, placeholder_identity};
use crate::messenger_types::{ConversationSummary, CounterpartIdentity, LastMessage};
use crate::models::{Role, UserSession};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

pub const EMPTY_PREVIEW: &str = "Henüz mesaj yok";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub preview_max_chars: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            preview_max_chars: 80,
        }
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `…`.
pub fn preview_text(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}

async fn resolve_counterparts<B: ChatBackend>(
    backend: &B,
    counterpart_role: Role,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, CounterpartIdentity>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let identities: HashMap<Uuid, CounterpartIdentity> = match counterpart_role {
        Role::Business => backend
            .businesses(ids)
            .await?
            .iter()
            .map(|p| (p.user_id, business_identity(p)))
            .collect(),
        Role::Courier => backend
            .couriers(ids)
            .await?
            .iter()
            .map(|p| (p.user_id, courier_identity(p)))
            .collect(),
    };
    Ok(identities)
}

pub async fn aggregate_conversations<B: ChatBackend>(
    backend: &B,
    session: &UserSession,
    options: AggregateOptions,
) -> Result<Vec<ConversationSummary>> {
    let conversations = backend.conversations_for(session).await?;
    if conversations.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = conversations.iter().map(|c| c.id).collect();
    let mut counterpart_ids: Vec<Uuid> = conversations
        .iter()
        .map(|c| c.counterpart_id(session))
        .collect();
    counterpart_ids.sort_unstable();
    counterpart_ids.dedup();

    let counterpart_role = session.role.counterpart();
    let identities = resolve_counterparts(backend, counterpart_role, &counterpart_ids).await?;
    let latest = backend.latest_messages(&ids).await?;
    let unread = backend.unread_counts(&ids, session.user_id).await?;

    let mut summaries: Vec<ConversationSummary> = conversations
        .into_iter()
        .map(|c| {
            let counterpart_id = c.counterpart_id(session);
            let last = latest.get(&c.id);
            ConversationSummary {
                conversation_id: c.id,
                counterpart_id,
                counterpart: identities
                    .get(&counterpart_id)
                    .cloned()
                    .unwrap_or_else(|| placeholder_identity(counterpart_role)),
                last_message: last.map(LastMessage::from),
                preview: last
                    .map(|m| preview_text(&m.content, options.preview_max_chars))
                    .unwrap_or_else(|| EMPTY_PREVIEW.to_string()),
                is_own_last: last.is_some_and(|m| m.sender_id == session.user_id),
                unread_count: unread.get(&c.id).copied().unwrap_or(0),
                last_activity: last.map(|m| m.created_at).unwrap_or(c.updated_at),
            }
        })
        .collect();

    sort_by_activity(&mut summaries);
    debug!(
        "aggregated {} conversations for {} ({})",
        summaries.len(),
        session.user_id,
        session.role
    );
    Ok(summaries)
}

/// Newest activity first; ties fall back to conversation id so the order is
/// stable between refreshes.
pub fn sort_by_activity(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| {
        b.last_activity
            .cmp(&a.last_activity)
            .then_with(|| a.conversation_id.cmp(&b.conversation_id))
    });
}

/// Badge count across the whole list.
pub fn total_unread(summaries: &[ConversationSummary]) -> u64 {
    summaries.iter().map(|s| s.unread_count).sum()
}
