/// Shared view types for the messaging layer
use crate::models::{Conversation, Message};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the other participant is shown: masked name, picture, role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartIdentity {
    pub masked_name: String,
    pub avatar_url: Option<String>,
    pub role_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sender_id: Uuid,
}

impl From<&Message> for LastMessage {
    fn from(m: &Message) -> Self {
        Self {
            content: m.content.clone(),
            created_at: m.created_at,
            sender_id: m.sender_id,
        }
    }
}

/// One row of the conversation sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    /// The other party's user id
    pub counterpart_id: Uuid,
    pub counterpart: CounterpartIdentity,
    pub last_message: Option<LastMessage>,
    /// Preview text of the last message, or a placeholder
    pub preview: String,
    /// True when the current user wrote the last message
    pub is_own_last: bool,
    /// Messages from the counterpart the current user has not read
    pub unread_count: u64,
    /// Last message time, or the conversation's `updated_at` without messages
    pub last_activity: DateTime<Utc>,
}

/// Row-level change notifications from the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A conversation was created
    ConversationInserted { conversation: Conversation },
    /// A conversation row changed (timestamp bump, delete flag)
    ConversationUpdated { conversation: Conversation },
    /// A message was sent
    MessageInserted { message: Message },
    /// A message row changed (read flag)
    MessageUpdated { message: Message },
}

impl ChangeEvent {
    /// Conversation the changed row belongs to.
    pub fn conversation_id(&self) -> Uuid {
        match self {
            ChangeEvent::ConversationInserted { conversation }
            | ChangeEvent::ConversationUpdated { conversation } => conversation.id,
            ChangeEvent::MessageInserted { message } | ChangeEvent::MessageUpdated { message } => {
                message.conversation_id
            }
        }
    }
}
