//! Subscriber hub
//!
//! Tracks live subscribers and fans merged readings out to them. Every
//! subscriber owns a bounded queue; the hub only ever `try_send`s into it, so
//! a stalled consumer cannot hold up serial ingest.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use uuid::Uuid;

use crate::reading::{Fragment, Reading, ReadingStore};

/// Default per-subscriber queue depth
pub const SUBSCRIBER_QUEUE_DEPTH: usize = 32;

/// Connection identity of one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Receiving end handed to a registered subscriber
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Reading>,
}

impl Subscription {
    /// Identity to pass back to [`SubscriberHub::unregister`]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next snapshot, or `None` once the hub has dropped this subscriber
    pub async fn recv(&mut self) -> Option<Reading> {
        self.rx.recv().await
    }

    /// Next snapshot if one is already queued
    pub fn try_recv(&mut self) -> Option<Reading> {
        self.rx.try_recv().ok()
    }
}

/// Fan-out point for merged readings
#[derive(Debug, Clone)]
pub struct SubscriberHub {
    store: ReadingStore,
    members: Arc<Mutex<HashMap<SubscriberId, mpsc::Sender<Reading>>>>,
    queue_depth: usize,
}

impl SubscriberHub {
    /// Hub whose new subscribers are primed from `store`
    pub fn new(store: ReadingStore) -> Self {
        Self::with_queue_depth(store, SUBSCRIBER_QUEUE_DEPTH)
    }

    /// Hub with a custom per-subscriber queue depth (at least 1)
    pub fn with_queue_depth(store: ReadingStore, queue_depth: usize) -> Self {
        Self {
            store,
            members: Arc::new(Mutex::new(HashMap::new())),
            queue_depth: queue_depth.max(1),
        }
    }

    fn members(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Reading>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a subscriber. Its queue already holds the current snapshot.
    pub fn register(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let id = SubscriberId::new();

        // Snapshot and insert under the membership lock so no broadcast can
        // slip in ahead of the initial snapshot.
        let mut members = self.members();
        let _ = tx.try_send(self.store.snapshot());
        members.insert(id, tx);
        debug!(subscriber = %id, total = members.len(), "subscriber registered");

        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut members = self.members();
        let removed = members.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, total = members.len(), "subscriber unregistered");
        }
        removed
    }

    /// Merge `fragment` into the store and fan the result out, all under the
    /// membership lock. A concurrent `register` sees either the state before
    /// this merge (and then receives the broadcast) or the state after it
    /// (and does not), never both. Returns the snapshot and how many
    /// subscribers accepted it.
    pub fn publish(&self, fragment: &Fragment) -> (Reading, usize) {
        let mut members = self.members();
        let snapshot = self.store.merge(fragment);
        let delivered = fan_out(&mut members, snapshot);
        (snapshot, delivered)
    }

    /// Queue `reading` for every open subscriber and return how many
    /// accepted it. Closed subscribers are dropped from membership; a full
    /// queue only loses this one snapshot.
    pub fn broadcast(&self, reading: Reading) -> usize {
        fan_out(&mut self.members(), reading)
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.members().len()
    }

    /// True if nobody is subscribed
    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }
}

fn fan_out(members: &mut HashMap<SubscriberId, mpsc::Sender<Reading>>, reading: Reading) -> usize {
    let mut delivered = 0;
    members.retain(|id, tx| match tx.try_send(reading) {
        Ok(()) => {
            delivered += 1;
            true
        }
        Err(TrySendError::Full(_)) => {
            debug!(subscriber = %id, "subscriber lagging, snapshot skipped");
            true
        }
        Err(TrySendError::Closed(_)) => {
            debug!(subscriber = %id, "subscriber gone, removing");
            false
        }
    });
    delivered
}
