//! In-memory broadcast hub.
//!
//! Fans change events out to every connected viewer. Each viewer owns a
//! bounded channel; delivery is best-effort and never blocks the sender.
//! The subscriber set is the only shared mutable state in the process that
//! needs an explicit lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use shared::Event;

/// Undelivered events a single viewer may buffer before further
/// broadcasts to it are dropped.
const SUBSCRIBER_BUFFER: usize = 32;

/// The set of connected viewer channels.
///
/// Lock discipline: the mutex guards only set membership. `broadcast`
/// snapshots the senders under the lock and delivers outside it, so a slow
/// viewer can never stall the caller or other viewers.
pub struct EventHub {
    inner: Mutex<HubInner>,
}

struct HubInner {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::Sender<Event>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HubInner {
                next_id: 0,
                subscribers: HashMap::new(),
            }),
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, HubInner> {
        // Nothing panics while holding the lock, so poisoning cannot occur
        self.inner.lock().expect("subscriber set mutex poisoned")
    }

    /// Register a new viewer and hand back its receiving half.
    ///
    /// Registration is atomic with respect to a concurrent broadcast: the
    /// broadcast either sees the new subscriber or it does not.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        let id = {
            let mut inner = self.lock_inner();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.insert(id, tx);
            id
        };
        debug!("Viewer {} subscribed", id);

        Subscription {
            id,
            hub: Arc::clone(self),
            rx,
        }
    }

    /// Remove a viewer from the set. Idempotent: unsubscribing an id that
    /// is already gone is a no-op.
    pub fn unsubscribe(&self, id: u64) {
        let removed = self.lock_inner().subscribers.remove(&id).is_some();
        if removed {
            debug!("Viewer {} unsubscribed", id);
        }
    }

    /// Deliver an event to every connected viewer.
    ///
    /// A viewer whose channel is full or already closed is skipped; the
    /// failure never reaches the caller that triggered the change.
    pub fn broadcast(&self, event: &Event) {
        let targets: Vec<(u64, mpsc::Sender<Event>)> = {
            let inner = self.lock_inner();
            inner
                .subscribers
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        for (id, tx) in targets {
            if tx.try_send(event.clone()).is_err() {
                debug!("Dropping event for viewer {} (full or closed)", id);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_inner().subscribers.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One viewer's receiving half. Dropping it unregisters the viewer, so
/// every exit path of a stream task cleans up after itself.
pub struct Subscription {
    id: u64,
    hub: Arc<EventHub>,
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. Returns `None` once the sending half is
    /// gone, which only happens after this viewer was unsubscribed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Non-blocking receive for draining queues in tests.
    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Result<Event, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
