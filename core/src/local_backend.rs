/// Embedded stand-in for the hosted data service.
///
/// Rows live in one sled database split across the conversation, message and
/// profile stores. Every successful write is published on the change feed so
/// open views can follow along.
use crate::backend::{ChatBackend, HistoryQuery};
use crate::config::Config;
use crate::conversation_store::ConversationStore;
use crate::error::{ChatError, Result};
use crate::message_store::MessageStore;
use crate::messenger_types::ChangeEvent;
use crate::models::{
    BusinessProfile, Conversation, CourierProfile, Message, NewMessage, Role, UserSession,
};
use crate::profile_store::ProfileStore;
use crate::realtime::{ChangeFeed, Subscription, SubscriptionScope, DEFAULT_FEED_CAPACITY};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct LocalBackend {
    db: sled::Db,
    conversations: ConversationStore,
    messages: MessageStore,
    profiles: ProfileStore,
    feed: ChangeFeed,
}

impl LocalBackend {
    /// Open (or create) the database under `data_dir`.
    pub fn open(data_dir: &Path, feed_capacity: usize) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db = sled::open(data_dir.join("chat.db"))
            .map_err(|e| ChatError::storage("open chat DB", e))?;
        info!("opened chat store at {}", data_dir.display());
        Self::with_db(db, feed_capacity)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(&config.data_dir, config.feed_capacity)
    }

    /// Throwaway in-memory database, removed when the last handle drops.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| ChatError::storage("open temporary chat DB", e))?;
        Self::with_db(db, DEFAULT_FEED_CAPACITY)
    }

    fn with_db(db: sled::Db, feed_capacity: usize) -> Result<Self> {
        Ok(Self {
            conversations: ConversationStore::new(&db)?,
            messages: MessageStore::new(&db)?,
            profiles: ProfileStore::new(&db)?,
            feed: ChangeFeed::new(feed_capacity),
            db,
        })
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn message_count(&self) -> usize {
        self.messages.count()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.count()
    }

    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| ChatError::storage("flush chat DB", e))?;
        Ok(())
    }
}

impl ChatBackend for LocalBackend {
    async fn conversations_for(&self, session: &UserSession) -> Result<Vec<Conversation>> {
        self.conversations.list_visible(session)
    }

    async fn conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.conversations.get(id)
    }

    async fn find_conversation(
        &self,
        business_id: Uuid,
        courier_id: Uuid,
    ) -> Result<Option<Conversation>> {
        self.conversations.find_pair(business_id, courier_id)
    }

    async fn create_conversation(&self, business_id: Uuid, courier_id: Uuid) -> Result<Conversation> {
        let (conversation, created) = self
            .conversations
            .create_or_get(Conversation::new(business_id, courier_id))?;
        if created {
            debug!("created conversation {}", conversation.id);
            self.feed.publish(ChangeEvent::ConversationInserted {
                conversation: conversation.clone(),
            });
        }
        Ok(conversation)
    }

    async fn businesses(&self, ids: &[Uuid]) -> Result<Vec<BusinessProfile>> {
        self.profiles.businesses(ids)
    }

    async fn couriers(&self, ids: &[Uuid]) -> Result<Vec<CourierProfile>> {
        self.profiles.couriers(ids)
    }

    async fn upsert_business(&self, profile: BusinessProfile) -> Result<()> {
        self.profiles.upsert_business(&profile)
    }

    async fn upsert_courier(&self, profile: CourierProfile) -> Result<()> {
        self.profiles.upsert_courier(&profile)
    }

    async fn latest_messages(&self, conversation_ids: &[Uuid]) -> Result<HashMap<Uuid, Message>> {
        let mut out = HashMap::with_capacity(conversation_ids.len());
        for id in conversation_ids {
            if let Some(msg) = self.messages.latest(*id)? {
                out.insert(*id, msg);
            }
        }
        Ok(out)
    }

    async fn unread_counts(
        &self,
        conversation_ids: &[Uuid],
        reader_id: Uuid,
    ) -> Result<HashMap<Uuid, u64>> {
        let mut out = HashMap::with_capacity(conversation_ids.len());
        for id in conversation_ids {
            out.insert(*id, self.messages.count_unread(*id, reader_id)?);
        }
        Ok(out)
    }

    async fn messages(&self, conversation_id: Uuid, query: HistoryQuery) -> Result<Vec<Message>> {
        self.messages.list(conversation_id, query)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        let content = message.content.trim();
        if content.is_empty() {
            return Err(ChatError::InvalidInput("message content is empty".to_string()));
        }
        let conversation = self
            .conversations
            .get(message.conversation_id)?
            .ok_or_else(|| ChatError::NotFound(format!("conversation {}", message.conversation_id)))?;
        if conversation.participant(message.sender_role) != message.sender_id {
            return Err(ChatError::NotParticipant {
                user_id: message.sender_id,
                conversation_id: conversation.id,
            });
        }

        let stored = Message {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_role: message.sender_role,
            content: content.to_string(),
            created_at: Utc::now(),
            is_read: false,
        };
        self.messages.save(&stored)?;
        self.feed.publish(ChangeEvent::MessageInserted {
            message: stored.clone(),
        });
        Ok(stored)
    }

    async fn touch_conversation(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let conversation = self.conversations.update(id, |c| {
            c.updated_at = at;
            Ok(())
        })?;
        self.feed
            .publish(ChangeEvent::ConversationUpdated { conversation });
        Ok(())
    }

    async fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<usize> {
        let changed = self.messages.mark_read(conversation_id, reader_id)?;
        let count = changed.len();
        for message in changed {
            self.feed.publish(ChangeEvent::MessageUpdated { message });
        }
        Ok(count)
    }

    async fn mark_message_read(&self, message_id: Uuid, reader_id: Uuid) -> Result<bool> {
        match self.messages.mark_one_read(message_id, reader_id)? {
            Some(message) => {
                self.feed.publish(ChangeEvent::MessageUpdated { message });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_hidden(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: Role,
        hidden: bool,
    ) -> Result<Conversation> {
        let conversation = self.conversations.update(conversation_id, |c| {
            if c.participant(role) != user_id {
                return Err(ChatError::NotParticipant {
                    user_id,
                    conversation_id,
                });
            }
            c.set_hidden(role, hidden);
            Ok(())
        })?;
        self.feed.publish(ChangeEvent::ConversationUpdated {
            conversation: conversation.clone(),
        });
        Ok(conversation)
    }

    fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        self.feed.subscribe(scope)
    }
}
