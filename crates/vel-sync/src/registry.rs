//! # Subscription Registry
//!
//! Per-collection change listeners.
//!
//! ## Dispatch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  notify(change)                                                        │
//! │     │                                                                   │
//! │     ├── 1. lock, clone Arc<listener> list for change.collection,       │
//! │     │      unlock                                                       │
//! │     │                                                                   │
//! │     └── 2. call each listener in registration order                    │
//! │             ├── returns      → delivered += 1                          │
//! │             └── panics       → error!, continue with the next one      │
//! │                                                                         │
//! │  Listeners may subscribe / unsubscribe from inside a callback.         │
//! │  A listener removed during a round is still called in that round;      │
//! │  one added during a round is first called on the next.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error};
use vel_core::Record;

/// Identifier of one registered listener.
pub type ListenerId = u64;

/// Closure type for collection listeners.
pub type ListenerFn = dyn Fn(&CollectionChange) + Send + Sync;

/// What a listener receives after a collection's cache was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionChange {
    /// Collection that changed.
    pub collection: String,

    /// Records received from the backend this cycle (tombstones included).
    pub updates: Vec<Record>,

    /// Merged record set now held by the cache.
    pub records: Vec<Record>,
}

struct RegistryInner {
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Arc<ListenerFn>)>>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn remove(&self, collection: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(collection) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(lid, _)| *lid != id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(collection);
        }
        removed
    }
}

/// Listener sets keyed by collection name.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.inner.listeners.lock();
        let counts: HashMap<&str, usize> = listeners
            .iter()
            .map(|(collection, entries)| (collection.as_str(), entries.len()))
            .collect();
        f.debug_struct("SubscriptionRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        SubscriptionRegistry {
            inner: Arc::new(RegistryInner {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers `callback` for changes to `collection`.
    ///
    /// Dropping the returned [`Subscription`] does not unsubscribe; call
    /// [`Subscription::unsubscribe`].
    pub fn subscribe<F>(&self, collection: &str, callback: F) -> Subscription
    where
        F: Fn(&CollectionChange) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        debug!(collection = %collection, listener_id = id, "Listener subscribed");

        Subscription {
            registry: Arc::downgrade(&self.inner),
            collection: collection.to_string(),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Calls every listener of `change.collection`, returning how many
    /// returned without panicking.
    pub fn notify(&self, change: &CollectionChange) -> usize {
        let snapshot: Vec<(ListenerId, Arc<ListenerFn>)> = {
            let listeners = self.inner.listeners.lock();
            match listeners.get(&change.collection) {
                Some(entries) => entries.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(change))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(
                        collection = %change.collection,
                        listener_id = id,
                        panic = %message,
                        "Collection listener panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Number of listeners registered for `collection`.
    pub fn listener_count(&self, collection: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .get(collection)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by [`SubscriptionRegistry::subscribe`].
///
/// Holds only a weak reference; it never keeps the registry alive.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<RegistryInner>,
    collection: String,
    id: ListenerId,
    active: AtomicBool,
}

impl Subscription {
    /// Removes the listener. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.registry.upgrade() {
            if inner.remove(&self.collection, self.id) {
                debug!(collection = %self.collection, listener_id = self.id, "Listener unsubscribed");
            }
        }
    }

    /// Collection this subscription listens to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether `unsubscribe` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
