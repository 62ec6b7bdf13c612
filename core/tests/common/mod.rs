//! Shared fixtures for the integration tests
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use kuryelink_core::backend::{ChatBackend, HistoryQuery};
use kuryelink_core::models::NewMessage;
use kuryelink_core::realtime::{Subscription, SubscriptionScope};
use kuryelink_core::{
    BusinessProfile, ChatError, Conversation, CourierProfile, LocalBackend, Message, Result, Role,
    UserSession,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// A business and a courier with profiles, plus their shared conversation.
pub struct Pair {
    pub business: UserSession,
    pub courier: UserSession,
    pub conversation: Conversation,
}

pub async fn seed_business<B: ChatBackend>(backend: &B, name: &str) -> UserSession {
    let id = Uuid::new_v4();
    backend
        .upsert_business(BusinessProfile {
            user_id: id,
            business_name: name.to_string(),
            logo_url: Some(format!("https://cdn.example/{}.png", id)),
        })
        .await
        .unwrap();
    UserSession::new(id, Role::Business)
}

pub async fn seed_courier<B: ChatBackend>(backend: &B, first: &str, last: &str) -> UserSession {
    let id = Uuid::new_v4();
    backend
        .upsert_courier(CourierProfile {
            user_id: id,
            first_name: first.to_string(),
            last_name: Some(last.to_string()),
            avatar_url: None,
        })
        .await
        .unwrap();
    UserSession::new(id, Role::Courier)
}

pub async fn seed_pair<B: ChatBackend>(backend: &B) -> Pair {
    let business = seed_business(backend, "Engin Has Lahmacun").await;
    let courier = seed_courier(backend, "Ahmet", "Yılmaz").await;
    let conversation = backend
        .create_conversation(business.user_id, courier.user_id)
        .await
        .unwrap();
    Pair {
        business,
        courier,
        conversation,
    }
}

pub async fn say<B: ChatBackend>(
    backend: &B,
    from: &UserSession,
    conversation_id: Uuid,
    text: &str,
) -> Message {
    backend
        .insert_message(NewMessage {
            conversation_id,
            sender_id: from.user_id,
            sender_role: from.role,
            content: text.to_string(),
        })
        .await
        .unwrap()
}

/// `LocalBackend` with switches for injecting failures and latency, and a
/// counter of insert calls.
pub struct FlakyBackend {
    pub inner: LocalBackend,
    pub fail_reads: AtomicBool,
    pub fail_inserts: AtomicBool,
    pub fail_touch: AtomicBool,
    pub fail_mark_read: AtomicBool,
    pub fail_hide: AtomicBool,
    pub insert_delay_ms: AtomicUsize,
    pub insert_calls: AtomicUsize,
}

fn injected(op: &str) -> ChatError {
    ChatError::Storage(format!("injected failure: {}", op))
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self {
            inner: LocalBackend::temporary().unwrap(),
            fail_reads: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
            fail_touch: AtomicBool::new(false),
            fail_mark_read: AtomicBool::new(false),
            fail_hide: AtomicBool::new(false),
            insert_delay_ms: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
        }
    }

    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    pub fn inserts(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

impl ChatBackend for FlakyBackend {
    async fn conversations_for(&self, session: &UserSession) -> Result<Vec<Conversation>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("conversations_for"));
        }
        self.inner.conversations_for(session).await
    }

    async fn conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.inner.conversation(id).await
    }

    async fn find_conversation(
        &self,
        business_id: Uuid,
        courier_id: Uuid,
    ) -> Result<Option<Conversation>> {
        self.inner.find_conversation(business_id, courier_id).await
    }

    async fn create_conversation(&self, business_id: Uuid, courier_id: Uuid) -> Result<Conversation> {
        self.inner.create_conversation(business_id, courier_id).await
    }

    async fn businesses(&self, ids: &[Uuid]) -> Result<Vec<BusinessProfile>> {
        self.inner.businesses(ids).await
    }

    async fn couriers(&self, ids: &[Uuid]) -> Result<Vec<CourierProfile>> {
        self.inner.couriers(ids).await
    }

    async fn upsert_business(&self, profile: BusinessProfile) -> Result<()> {
        self.inner.upsert_business(profile).await
    }

    async fn upsert_courier(&self, profile: CourierProfile) -> Result<()> {
        self.inner.upsert_courier(profile).await
    }

    async fn latest_messages(&self, conversation_ids: &[Uuid]) -> Result<HashMap<Uuid, Message>> {
        self.inner.latest_messages(conversation_ids).await
    }

    async fn unread_counts(
        &self,
        conversation_ids: &[Uuid],
        reader_id: Uuid,
    ) -> Result<HashMap<Uuid, u64>> {
        self.inner.unread_counts(conversation_ids, reader_id).await
    }

    async fn messages(&self, conversation_id: Uuid, query: HistoryQuery) -> Result<Vec<Message>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("messages"));
        }
        self.inner.messages(conversation_id, query).await
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.insert_delay_ms.load(Ordering::SeqCst) as u64;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(injected("insert_message"));
        }
        self.inner.insert_message(message).await
    }

    async fn touch_conversation(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if self.fail_touch.load(Ordering::SeqCst) {
            return Err(injected("touch_conversation"));
        }
        self.inner.touch_conversation(id, at).await
    }

    async fn mark_read(&self, conversation_id: Uuid, reader_id: Uuid) -> Result<usize> {
        if self.fail_mark_read.load(Ordering::SeqCst) {
            return Err(injected("mark_read"));
        }
        self.inner.mark_read(conversation_id, reader_id).await
    }

    async fn mark_message_read(&self, message_id: Uuid, reader_id: Uuid) -> Result<bool> {
        if self.fail_mark_read.load(Ordering::SeqCst) {
            return Err(injected("mark_message_read"));
        }
        self.inner.mark_message_read(message_id, reader_id).await
    }

    async fn set_hidden(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        role: Role,
        hidden: bool,
    ) -> Result<Conversation> {
        if self.fail_hide.load(Ordering::SeqCst) {
            return Err(injected("set_hidden"));
        }
        self.inner
            .set_hidden(conversation_id, user_id, role, hidden)
            .await
    }

    fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        self.inner.subscribe(scope)
    }
}
