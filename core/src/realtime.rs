/// Change notification feed and scoped subscriptions.
///
/// The backend owns one `ChangeFeed` and publishes every row write on it.
/// Views hold a `Subscription` for as long as they are open; dropping it
/// releases the receiver.
use crate::messenger_types::ChangeEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionScope {
    /// Every conversation and message event (list context)
    Global,
    /// Only events for one conversation (chat session context)
    Conversation(Uuid),
}

impl SubscriptionScope {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            SubscriptionScope::Global => true,
            SubscriptionScope::Conversation(id) => event.conversation_id() == *id,
        }
    }
}

/// What a subscriber gets out of `recv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveUpdate {
    Change(ChangeEvent),
    /// The subscriber fell behind and `n` events were dropped; resync from
    /// the backend.
    Lagged(u64),
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no listeners is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        debug!("subscribing to change feed ({:?})", scope);
        Subscription {
            rx: self.tx.subscribe(),
            scope,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    scope: SubscriptionScope,
}

impl Subscription {
    pub fn scope(&self) -> SubscriptionScope {
        self.scope
    }

    /// Next update in scope. `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<LiveUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.scope.matches(&event) {
                        return Some(LiveUpdate::Change(event));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("change feed subscriber lagged {} events", n);
                    return Some(LiveUpdate::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of `recv`, for draining whatever is queued.
    pub fn try_recv(&mut self) -> Option<LiveUpdate> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if self.scope.matches(&event) {
                        return Some(LiveUpdate::Change(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("change feed subscriber lagged {} events", n);
                    return Some(LiveUpdate::Lagged(n));
                }
                Err(_) => return None,
            }
        }
    }

    /// Release the subscription. Dropping does the same; this just logs it.
    pub fn unsubscribe(self) {
        debug!("releasing change feed subscription ({:?})", self.scope);
    }
}
