//! Live-query registry delivering full result snapshots to subscribers.
//!
//! # Responsibility
//! - Track active live queries keyed by caller-defined scope (`K`).
//! - Deliver snapshots (`T`) over per-subscriber channels.
//!
//! # Invariants
//! - Every subscriber receives its initial snapshot before any update.
//! - Each delivery is a complete result set, never a delta.
//! - A cancelled or dropped subscription receives nothing further and is
//!   removed from the registry.
//! - Subscribers whose receiving side is gone are pruned on next publish.

use log::debug;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Registry handle id for one live query.
pub type WatchId = u64;

struct Watcher<K, T> {
    key: K,
    sender: Sender<T>,
}

/// Shared registry of live queries over one kind of snapshot.
pub struct LiveQueryHub<K, T> {
    name: &'static str,
    next_id: AtomicU64,
    watchers: Mutex<BTreeMap<WatchId, Watcher<K, T>>>,
}

trait Unregister: Send + Sync {
    fn unregister(&self, id: WatchId);
}

impl<K, T> LiveQueryHub<K, T>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
{
    /// Creates an empty hub. `name` is used only in log events.
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            next_id: AtomicU64::new(1),
            watchers: Mutex::new(BTreeMap::new()),
        })
    }

    /// Registers a live query and queues `initial` as its first snapshot.
    pub fn register(self: &Arc<Self>, key: K, initial: T) -> LiveSubscription<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel();
        // Receiver is alive here, so the initial send cannot fail.
        let _ = sender.send(initial);

        let active = {
            let mut watchers = self.watchers.lock();
            watchers.insert(id, Watcher { key, sender });
            watchers.len()
        };
        debug!(
            "event=live_register module=live status=ok hub={} watch_id={} active={}",
            self.name, id, active
        );

        let hub: Arc<dyn Unregister> = self.clone();
        LiveSubscription {
            id,
            receiver,
            hub: Some(Arc::downgrade(&hub)),
        }
    }

    /// Returns id and key of every live query whose key satisfies `predicate`.
    pub fn matching(&self, predicate: impl Fn(&K) -> bool) -> Vec<(WatchId, K)> {
        self.watchers
            .lock()
            .iter()
            .filter(|(_, watcher)| predicate(&watcher.key))
            .map(|(id, watcher)| (*id, watcher.key.clone()))
            .collect()
    }

    /// Delivers one snapshot. Returns `false` when the subscriber is gone.
    pub fn publish(&self, id: WatchId, snapshot: T) -> bool {
        let mut watchers = self.watchers.lock();
        let Some(watcher) = watchers.get(&id) else {
            return false;
        };
        if watcher.sender.send(snapshot).is_ok() {
            return true;
        }
        watchers.remove(&id);
        debug!(
            "event=live_prune module=live status=ok hub={} watch_id={}",
            self.name, id
        );
        false
    }

    /// Number of registered live queries.
    pub fn len(&self) -> usize {
        self.watchers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> Unregister for LiveQueryHub<K, T>
where
    K: Send,
    T: Send,
{
    fn unregister(&self, id: WatchId) {
        if self.watchers.lock().remove(&id).is_some() {
            debug!(
                "event=live_cancel module=live status=ok hub={} watch_id={}",
                self.name, id
            );
        }
    }
}

/// Receiving side of one live query.
///
/// Dropping the subscription cancels it.
pub struct LiveSubscription<T> {
    id: WatchId,
    receiver: Receiver<T>,
    hub: Option<Weak<dyn Unregister>>,
}

impl<T> LiveSubscription<T> {
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Blocks until the next snapshot. `None` once the query is closed.
    pub fn recv(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Returns a queued snapshot without blocking.
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for the next snapshot.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(snapshot) => Some(snapshot),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drains every queued snapshot without blocking.
    pub fn try_iter(&self) -> impl Iterator<Item = T> + '_ {
        self.receiver.try_iter()
    }

    /// Drains the queue and keeps only the newest snapshot.
    pub fn latest(&self) -> Option<T> {
        self.try_iter().last()
    }

    /// Stops delivery and removes the query from its hub.
    pub fn cancel(mut self) {
        self.unregister();
    }

    fn unregister(&mut self) {
        if let Some(hub) = self.hub.take().and_then(|weak| weak.upgrade()) {
            hub.unregister(self.id);
        }
    }
}

impl<T> Iterator for LiveSubscription<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.recv()
    }
}

impl<T> Drop for LiveSubscription<T> {
    fn drop(&mut self) {
        self.unregister();
    }
}
