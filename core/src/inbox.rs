/// Conversation list view state.
///
/// Holds the aggregated sidebar, the selected conversation and a global
/// change subscription. Any change re-runs the whole aggregation.
use crate::aggregator::{aggregate_conversations, total_unread, AggregateOptions};
use crate::backend::ChatBackend;
use crate::config::Config;
use crate::error::Result;
use crate::messenger_types::ConversationSummary;
use crate::models::UserSession;
use crate::realtime::{Subscription, SubscriptionScope};
use crate::soft_delete::hide_conversation;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

pub const LIST_LOAD_FAILED: &str = "Sohbetler yüklenemedi";
pub const DELETE_FAILED: &str = "Sohbet silinemedi";

#[derive(Default)]
struct InboxState {
    summaries: Vec<ConversationSummary>,
    selected: Option<Uuid>,
    last_error: Option<String>,
}

pub struct Inbox<B: ChatBackend> {
    backend: Arc<B>,
    session: UserSession,
    options: AggregateOptions,
    state: Mutex<InboxState>,
    subscription: tokio::sync::Mutex<Option<Subscription>>,
}

impl<B: ChatBackend> Inbox<B> {
    /// Subscribe to changes and load the list. A failed first load leaves an
    /// empty list with `last_error` set rather than failing the view.
    pub async fn open(backend: Arc<B>, session: UserSession, config: &Config) -> Self {
        let subscription = backend.subscribe(SubscriptionScope::Global);
        let inbox = Self {
            backend,
            session,
            options: AggregateOptions {
                preview_max_chars: config.preview_max_chars,
            },
            state: Mutex::new(InboxState::default()),
            subscription: tokio::sync::Mutex::new(Some(subscription)),
        };
        let _ = inbox.refresh().await;
        inbox
    }

    fn lock(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn session(&self) -> &UserSession {
        &self.session
    }

    /// Recompute the list from scratch. On failure the previous list stays.
    pub async fn refresh(&self) -> Result<()> {
        match aggregate_conversations(self.backend.as_ref(), &self.session, self.options).await {
            Ok(summaries) => {
                let mut state = self.lock();
                if let Some(selected) = state.selected {
                    if !summaries.iter().any(|s| s.conversation_id == selected) {
                        state.selected = None;
                    }
                }
                state.summaries = summaries;
                if state.last_error.as_deref() == Some(LIST_LOAD_FAILED) {
                    state.last_error = None;
                }
                Ok(())
            }
            Err(e) => {
                warn!("loading conversations for {} failed: {}", self.session.user_id, e);
                self.lock().last_error = Some(LIST_LOAD_FAILED.to_string());
                Err(e)
            }
        }
    }

    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.lock().summaries.clone()
    }

    pub fn total_unread(&self) -> u64 {
        total_unread(&self.lock().summaries)
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Select a conversation for the detail pane. Returns false if it is not
    /// in the list.
    pub fn select(&self, conversation_id: Uuid) -> bool {
        let mut state = self.lock();
        if state
            .summaries
            .iter()
            .any(|s| s.conversation_id == conversation_id)
        {
            state.selected = Some(conversation_id);
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.lock().selected
    }

    pub fn clear_selection(&self) {
        self.lock().selected = None;
    }

    /// Hide a conversation for the current user. On success it leaves the
    /// list and, if it was open, the selection falls back to none. On failure
    /// the list is untouched and `last_error` is set.
    pub async fn delete(&self, conversation_id: Uuid) -> Result<()> {
        if let Err(e) = hide_conversation(self.backend.as_ref(), &self.session, conversation_id).await {
            warn!("deleting conversation {} failed: {}", conversation_id, e);
            self.lock().last_error = Some(DELETE_FAILED.to_string());
            return Err(e);
        }

        let mut state = self.lock();
        state.summaries.retain(|s| s.conversation_id != conversation_id);
        if state.selected == Some(conversation_id) {
            state.selected = None;
        }
        if state.last_error.as_deref() == Some(DELETE_FAILED) {
            state.last_error = None;
        }
        Ok(())
    }

    /// Wait for the next change and re-aggregate. Returns false once the
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
                debug!("inbox refresh triggered by {:?}", update);
                let _ = self.refresh().await;
                true
            }
            None => false,
        }
    }

    /// Drop every queued change and re-aggregate once if there was any.
    /// Returns whether a refresh ran.
    pub async fn drain_pending(&self) -> bool {
        let mut pending = 0;
        {
            let mut subscription = self.subscription.lock().await;
            if let Some(sub) = subscription.as_mut() {
                while sub.try_recv().is_some() {
                    pending += 1;
                }
            }
        }
        if pending == 0 {
            return false;
        }
        debug!("inbox refresh after {} queued changes", pending);
        let _ = self.refresh().await;
        true
    }

    /// Tear the view down, releasing the live subscription.
    pub async fn close(self) {
        if let Some(sub) = self.subscription.lock().await.take() {
            sub.unsubscribe();
        }
    }
}
