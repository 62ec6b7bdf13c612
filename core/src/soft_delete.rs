/// Per-participant conversation hiding.
///
/// Only the acting side's `deleted_by_<role>` flag is set. The counterpart
/// keeps seeing the conversation and no message is removed. There is no
/// restore from the UI.
use crate::backend::ChatBackend;
use crate::error::{ChatError, Result};
use crate::models::{Conversation, UserSession};
use tracing::info;
use uuid::Uuid;

pub async fn hide_conversation<B: ChatBackend>(
    backend: &B,
    session: &UserSession,
    conversation_id: Uuid,
) -> Result<Conversation> {
    let conversation = backend
        .conversation(conversation_id)
        .await?
        .ok_or_else(|| ChatError::NotFound(format!("conversation {}", conversation_id)))?;

    if !conversation.is_participant(session) {
        return Err(ChatError::NotParticipant {
            user_id: session.user_id,
            conversation_id,
        });
    }

    let updated = backend
        .set_hidden(conversation_id, session.user_id, session.role, true)
        .await?;
    info!(
        "conversation {} hidden for {} ({})",
        conversation_id, session.user_id, session.role
    );
    Ok(updated)
}
