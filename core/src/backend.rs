/// The data service the messaging core talks to.
///
/// Every operation is an async request. Implementations decide where the
/// rows live; `LocalBackend` keeps them in an embedded sled database.
use crate::error::Result;
use crate::models::{
    BusinessProfile, Conversation, CourierProfile, Message, NewMessage, Role, UserSession,
};
use crate::realtime::{Subscription, SubscriptionScope};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use uuid::Uuid;

/// Window of a conversation's history, oldest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Only messages strictly older than this `(created_at, id)` cursor
    pub before: Option<(DateTime<Utc>, Uuid)>,
    /// Keep at most this many of the newest matching messages
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(before: Option<(DateTime<Utc>, Uuid)>, limit: usize) -> Self {
        Self {
            before,
            limit: Some(limit),
        }
    }
}

pub trait ChatBackend: Send + Sync {
    /// Conversations where `session` is the participant for its role and has
    /// not hidden the conversation.
    fn conversations_for(
        &self,
        session: &UserSession,
    ) -> impl Future<Output = Result<Vec<Conversation>>> + Send;

    fn conversation(&self, id: Uuid) -> impl Future<Output = Result<Option<Conversation>>> + Send;

    fn find_conversation(
        &self,
        business_id: Uuid,
        courier_id: Uuid,
    ) -> impl Future<Output = Result<Option<Conversation>>> + Send;

    fn create_conversation(
        &self,
        business_id: Uuid,
        courier_id: Uuid,
    ) -> impl Future<Output = Result<Conversation>> + Send;

    /// Batch profile lookup. Unknown ids are simply absent from the result.
    fn businesses(&self, ids: &[Uuid])
        -> impl Future<Output = Result<Vec<BusinessProfile>>> + Send;

    fn couriers(&self, ids: &[Uuid]) -> impl Future<Output = Result<Vec<CourierProfile>>> + Send;

    fn upsert_business(&self, profile: BusinessProfile) -> impl Future<Output = Result<()>> + Send;

    fn upsert_courier(&self, profile: CourierProfile) -> impl Future<Output = Result<()>> + Send;

    /// Most recent message per conversation; conversations without messages
    /// are absent.
    fn latest_messages(
        &self,
        conversation_ids: &[Uuid],
    ) -> impl Future<Output = Result<HashMap<Uuid, Message>>> + Send;

    /// Unread messages not sent by `reader_id`, per conversation. Every
    /// requested id is present, possibly with 0.
    fn unread_counts(
        &self,
        conversation_ids: &[Uuid],
        reader_id: Uuid,
    ) -> impl Future<Output = Result<HashMap<Uuid, u64>>> + Send;

    fn messages(
        &self,
        conversation_id: Uuid,
        query: HistoryQuery,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;

    /// Store a message. Content is trimmed; blank content is rejected.
    fn insert_message(&self, message: NewMessage) -> impl Future<Output = Result<Message>> + Send;

    fn touch_conversation(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Flip `is_read` on every unread message in the conversation not sent by
    /// `reader_id`. Returns how many rows changed.
    fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> impl Future<Output = Result<usize>> + Send;

    /// Flip `is_read` on one message, unless `reader_id` sent it. Returns
    /// whether the row changed.
    fn mark_message_read(
        &self,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Set or clear `deleted_by_<role>`. `user_id` must be the participant
    /// holding `role`.
    fn set_hidden(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: Role,
        hidden: bool,
    ) -> impl Future<Output = Result<Conversation>> + Send;

    fn subscribe(&self, scope: SubscriptionScope) -> Subscription;
}
