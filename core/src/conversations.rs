/// Contact initiation: the first step of a conversation's lifecycle.
use crate::backend::ChatBackend;
use crate::error::{ChatError, Result};
use crate::models::{Conversation, Role, UserSession};
use tracing::info;
use uuid::Uuid;

/// Open the conversation between `session` and `counterpart_id`, creating it
/// on first contact.
///
/// A business and a courier share at most one conversation. If the initiator
/// had hidden it earlier, reaching out again makes it visible to them; the
/// counterpart's flag is left alone.
pub async fn start_conversation<B: ChatBackend>(
    backend: &B,
    session: &UserSession,
    counterpart_id: Uuid,
) -> Result<Conversation> {
    if counterpart_id == session.user_id {
        return Err(ChatError::InvalidInput(
            "cannot start a conversation with yourself".to_string(),
        ));
    }
    let (business_id, courier_id) = match session.role {
        Role::Business => (session.user_id, counterpart_id),
        Role::Courier => (counterpart_id, session.user_id),
    };

    match backend.find_conversation(business_id, courier_id).await? {
        Some(existing) if existing.is_hidden_for(session.role) => {
            info!("restoring conversation {} for {}", existing.id, session.user_id);
            backend
                .set_hidden(existing.id, session.user_id, session.role, false)
                .await
        }
        Some(existing) => Ok(existing),
        None => {
            let created = backend.create_conversation(business_id, courier_id).await?;
            info!(
                "conversation {} started between business {} and courier {}",
                created.id, business_id, courier_id
            );
            Ok(created)
        }
    }
}
