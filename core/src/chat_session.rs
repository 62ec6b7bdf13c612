/// One open conversation: history, read tracking, sending and live updates.
///
/// A `ChatSession` is shared by reference. Its view state sits behind a
/// `std::sync::Mutex` that is never held across an `.await`; the in-flight
/// send flag is an atomic so a second submit is dropped instead of queued.
use crate::backend::{ChatBackend, HistoryQuery};
use crate::error::{ChatError, Result};
use crate::masking::{business_identity, courier_identity};
use crate::messenger_types::{ChangeEvent, CounterpartIdentity};
use crate::models::{Conversation, Message, NewMessage, Role, UserSession};
use crate::realtime::{LiveUpdate, Subscription, SubscriptionScope};
use crate::timeline::{build_timeline, TimelineItem};
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SEND_FAILED: &str = "Mesaj gönderilemedi";
pub const LOAD_FAILED: &str = "Mesajlar yüklenemedi";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(Message),
    /// Draft was blank; nothing was sent
    Empty,
    /// Another send was still in flight; this submit was ignored
    AlreadySending,
    /// The current user hid this conversation; nothing was sent
    Closed,
}

struct SessionState {
    conversation: Conversation,
    /// Always ordered by `(created_at, id)`, no duplicate ids
    messages: Vec<Message>,
    draft: String,
    last_error: Option<String>,
    closed: bool,
}

/// Clears the in-flight flag however the send ends, including cancellation.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Insert keeping chronological order. Returns false if the id was already
/// present, in which case nothing changes.
fn insert_ordered(messages: &mut Vec<Message>, message: Message) -> bool {
    if messages.iter().any(|m| m.id == message.id) {
        return false;
    }
    let key = message.order_key();
    let pos = messages.partition_point(|m| m.order_key() < key);
    messages.insert(pos, message);
    true
}

pub struct ChatSession<B: ChatBackend> {
    backend: Arc<B>,
    session: UserSession,
    conversation_id: Uuid,
    counterpart: CounterpartIdentity,
    state: Mutex<SessionState>,
    sending: AtomicBool,
    subscription: tokio::sync::Mutex<Option<Subscription>>,
}

impl<B: ChatBackend> ChatSession<B> {
    /// Open a conversation for `session`: resolve it and the counterpart,
    /// subscribe to its changes, load history and mark incoming messages read.
    ///
    /// Fails with `NotFound` when the conversation or the counterpart profile
    /// cannot be resolved, or the caller is not a visible participant.
    pub async fn open(backend: Arc<B>, session: UserSession, conversation_id: Uuid) -> Result<Self> {
        let conversation = backend
            .conversation(conversation_id)
            .await?
            .filter(|c| c.is_participant(&session) && !c.is_hidden_for(session.role))
            .ok_or_else(|| ChatError::NotFound(format!("conversation {}", conversation_id)))?;

        let counterpart_id = conversation.counterpart_id(&session);
        let counterpart = match session.role.counterpart() {
            Role::Business => backend
                .businesses(&[counterpart_id])
                .await?
                .first()
                .map(business_identity),
            Role::Courier => backend
                .couriers(&[counterpart_id])
                .await?
                .first()
                .map(courier_identity),
        }
        .ok_or_else(|| ChatError::NotFound(format!("profile {}", counterpart_id)))?;

        // Subscribe first so nothing written during the history load is missed
        let subscription = backend.subscribe(SubscriptionScope::Conversation(conversation_id));

        let chat = Self {
            backend,
            session,
            conversation_id,
            counterpart,
            state: Mutex::new(SessionState {
                conversation,
                messages: Vec::new(),
                draft: String::new(),
                last_error: None,
                closed: false,
            }),
            sending: AtomicBool::new(false),
            subscription: tokio::sync::Mutex::new(Some(subscription)),
        };

        chat.load_history().await?;
        chat.mark_read().await;
        Ok(chat)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn conversation(&self) -> Conversation {
        self.lock().conversation.clone()
    }

    pub fn counterpart(&self) -> &CounterpartIdentity {
        &self.counterpart
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().draft = text.into();
    }

    /// Inline error for the composer or history pane, if the last operation failed.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// True once the current user hid this conversation elsewhere.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Replace the in-memory list with the full history.
    pub async fn load_history(&self) -> Result<usize> {
        let fetched = match self
            .backend
            .messages(self.conversation_id, HistoryQuery::all())
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!("loading history of {} failed: {}", self.conversation_id, e);
                self.lock().last_error = Some(LOAD_FAILED.to_string());
                return Err(e);
            }
        };

        let mut state = self.lock();
        state.messages.clear();
        for message in fetched {
            insert_ordered(&mut state.messages, message);
        }
        if state.last_error.as_deref() == Some(LOAD_FAILED) {
            state.last_error = None;
        }
        Ok(state.messages.len())
    }

    /// Prepend up to `limit` messages older than the oldest loaded one.
    /// Returns how many were added.
    pub async fn load_older(&self, limit: usize) -> Result<usize> {
        let cursor = match self.lock().messages.first() {
            Some(oldest) => oldest.order_key(),
            None => return Ok(0),
        };
        let older = self
            .backend
            .messages(self.conversation_id, HistoryQuery::page(Some(cursor), limit))
            .await?;

        let mut state = self.lock();
        let mut added = 0;
        for message in older {
            if insert_ordered(&mut state.messages, message) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Mark everything the counterpart sent as read. Failures are logged and
    /// dropped; the next load tries again.
    pub async fn mark_read(&self) -> usize {
        match self
            .backend
            .mark_read(self.conversation_id, self.session.user_id)
            .await
        {
            Ok(changed) => {
                let me = self.session.user_id;
                for m in self.lock().messages.iter_mut() {
                    if m.sender_id != me {
                        m.is_read = true;
                    }
                }
                changed
            }
            Err(e) => {
                warn!("mark-as-read for {} failed: {}", self.conversation_id, e);
                0
            }
        }
    }

    /// Send the current draft.
    pub async fn send(&self) -> Result<SendOutcome> {
        let (content, closed) = {
            let state = self.lock();
            (state.draft.trim().to_string(), state.closed)
        };
        if content.is_empty() {
            return Ok(SendOutcome::Empty);
        }
        if closed {
            debug!("not sending to hidden conversation {}", self.conversation_id);
            return Ok(SendOutcome::Closed);
        }
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("send already in flight for {}", self.conversation_id);
            return Ok(SendOutcome::AlreadySending);
        }
        let _in_flight = InFlight(&self.sending);

        let new_message = NewMessage {
            conversation_id: self.conversation_id,
            sender_id: self.session.user_id,
            sender_role: self.session.role,
            content,
        };
        let message = match self.backend.insert_message(new_message).await {
            Ok(message) => message,
            Err(e) => {
                warn!("sending to {} failed: {}", self.conversation_id, e);
                self.lock().last_error = Some(SEND_FAILED.to_string());
                return Err(e);
            }
        };

        // The message is stored; a failed timestamp bump must not undo that
        if let Err(e) = self
            .backend
            .touch_conversation(self.conversation_id, Utc::now())
            .await
        {
            warn!("bumping updated_at of {} failed: {}", self.conversation_id, e);
        }

        {
            let mut state = self.lock();
            state.draft.clear();
            state.last_error = None;
            insert_ordered(&mut state.messages, message.clone());
        }
        info!("message {} sent to {}", message.id, self.conversation_id);
        Ok(SendOutcome::Sent(message))
    }

    /// `set_draft` followed by `send`.
    pub async fn send_text(&self, text: &str) -> Result<SendOutcome> {
        self.set_draft(text);
        self.send().await
    }

    /// Apply one live update to the in-memory view.
    pub async fn apply_update(&self, update: LiveUpdate) -> Result<()> {
        let event = match update {
            LiveUpdate::Change(event) => event,
            LiveUpdate::Lagged(missed) => {
                debug!("resyncing {} after missing {} events", self.conversation_id, missed);
                self.load_history().await?;
                self.mark_read().await;
                return Ok(());
            }
        };
        if event.conversation_id() != self.conversation_id {
            return Ok(());
        }

        match event {
            ChangeEvent::MessageInserted { message } => {
                let incoming = message.sender_id != self.session.user_id && !message.is_read;
                let id = message.id;
                let added = insert_ordered(&mut self.lock().messages, message);
                if added && incoming {
                    self.mark_incoming_read(id).await;
                }
            }
            ChangeEvent::MessageUpdated { message } => {
                let mut state = self.lock();
                if let Some(existing) = state.messages.iter_mut().find(|m| m.id == message.id) {
                    *existing = message;
                }
            }
            ChangeEvent::ConversationInserted { conversation }
            | ChangeEvent::ConversationUpdated { conversation } => {
                let mut state = self.lock();
                if conversation.is_hidden_for(self.session.role) {
                    state.closed = true;
                }
                state.conversation = conversation;
            }
        }
        Ok(())
    }

    async fn mark_incoming_read(&self, message_id: Uuid) {
        match self
            .backend
            .mark_message_read(message_id, self.session.user_id)
            .await
        {
            Ok(_) => {
                if let Some(m) = self.lock().messages.iter_mut().find(|m| m.id == message_id) {
                    m.is_read = true;
                }
            }
            Err(e) => warn!("marking message {} read failed: {}", message_id, e),
        }
    }

    /// Wait for the next live update and apply it. Returns false once the
    /// subscription is gone.
    pub async fn process_next(&self) -> bool {
        let update = {
            let mut subscription = self.subscription.lock().await;
            match subscription.as_mut() {
                Some(sub) => sub.recv().await,
                None => return false,
            }
        };
        match update {
            Some(update) => {
                if let Err(e) = self.apply_update(update).await {
                    warn!("applying live update to {} failed: {}", self.conversation_id, e);
                }
                true
            }
            None => false,
        }
    }

    /// Apply every update already queued, without waiting. Returns how many
    /// were applied.
    pub async fn drain_pending(&self) -> usize {
        let mut applied = 0;
        loop {
            let update = {
                let mut subscription = self.subscription.lock().await;
                match subscription.as_mut().and_then(|sub| sub.try_recv()) {
                    Some(update) => update,
                    None => return applied,
                }
            };
            if let Err(e) = self.apply_update(update).await {
                warn!("applying live update to {} failed: {}", self.conversation_id, e);
            }
            applied += 1;
        }
    }

    pub fn timeline<Tz: TimeZone>(&self, tz: &Tz) -> Vec<TimelineItem> {
        build_timeline(&self.lock().messages, self.session.user_id, tz)
    }

    /// Tear the view down, releasing the live subscription.
    pub async fn close(self) {
        if let Some(sub) = self.subscription.lock().await.take() {
            sub.unsubscribe();
        }
    }
}
