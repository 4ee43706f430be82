//! Realtime query subscriptions.
//!
//! A subscription receives the complete ordered result set of its query once
//! on registration and again after every write to the queried collection.
//! Delivery goes through an unbounded channel so writers never wait on slow
//! readers.  Dropping the [`Subscription`] (or calling
//! [`Subscription::unsubscribe`]) deregisters it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::database::Database;
use crate::document::{Query, Snapshot};
use crate::error::{Result, StoreError};

struct Subscriber {
    query: Query,
    tx: mpsc::UnboundedSender<Vec<Snapshot>>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

pub(crate) struct SubscriptionHub {
    state: Arc<Mutex<HubState>>,
}

impl SubscriptionHub {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().map(|s| s.subscribers.len()).unwrap_or(0)
    }
}

/// Handle to a live query.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Vec<Snapshot>>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Build a subscription over a result-set channel.  `on_close` runs once
    /// when the handle is dropped; backends use it to deregister the query.
    pub fn new(
        rx: mpsc::UnboundedReceiver<Vec<Snapshot>>,
        on_close: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            on_close: Some(Box::new(on_close)),
        }
    }

    /// Wait for the next full result set.  Returns `None` once the store
    /// has been dropped.
    pub async fn next(&mut self) -> Option<Vec<Snapshot>> {
        self.rx.recv().await
    }

    /// Return a result set if one is already queued.
    pub fn try_next(&mut self) -> Option<Vec<Snapshot>> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(close) = self.on_close.take() {
            close();
        }
    }
}

fn deregister(hub: Weak<Mutex<HubState>>, id: u64) {
    if let Some(state) = hub.upgrade() {
        if let Ok(mut state) = state.lock() {
            state.subscribers.remove(&id);
            debug!(subscription = id, "subscription closed");
        }
    }
}

impl Database {
    /// Register a live query.  The current result set is queued before this
    /// returns.
    //
    // Lock order is always hub, then connection; writers release the
    // connection before notifying.
    pub fn subscribe_query(&self, query: Query) -> Result<Subscription> {
        let mut state = self.hub.state.lock().map_err(|_| StoreError::LockPoisoned)?;

        let initial = self.run_query(&query)?;
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so the first send cannot fail.
        let _ = tx.send(initial);

        let id = state.next_id;
        state.next_id += 1;
        debug!(subscription = id, collection = %query.collection, "subscription opened");
        state.subscribers.insert(id, Subscriber { query, tx });

        let hub = Arc::downgrade(&self.hub.state);
        Ok(Subscription::new(rx, move || deregister(hub, id)))
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.hub.len()
    }

    /// Push fresh result sets to every subscription on `collection`.
    pub(crate) fn notify(&self, collection: &str) {
        let Ok(mut state) = self.hub.state.lock() else {
            warn!("subscription hub lock poisoned, skipping notification");
            return;
        };

        let mut closed = Vec::new();
        for (id, sub) in state.subscribers.iter() {
            if sub.query.collection != collection {
                continue;
            }
            match self.run_query(&sub.query) {
                Ok(docs) => {
                    if sub.tx.send(docs).is_err() {
                        closed.push(*id);
                    }
                }
                Err(e) => {
                    warn!(subscription = id, error = %e, "failed to refresh subscription");
                }
            }
        }

        for id in closed {
            state.subscribers.remove(&id);
        }
    }
}
