//! Store registry - named shared state
//!
//! The registry maps string keys to entries holding a JSON value and an
//! ordered subscriber list. Unrelated instances reach the same entry by
//! key:
//! - Setting a value equal to the current one notifies nobody
//! - Notification is synchronous, in subscriber registration order, over a
//!   snapshot of the subscribers taken when the round starts
//! - A set issued while the key is already notifying updates the value at
//!   once but queues its notification behind the round in flight
//! - A failing subscriber is reported and the others still run

mod handle;

pub use handle::Store;

use crate::broadcast::{Origin, RemoteHandler, Transport};
use crate::config::HooksConfig;
use crate::effect::Cleanup;
use crate::error::{HookError, HookResult};
use crate::scheduler::Scheduler;
use crate::types::SubscriptionId;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

/// Callback notified with the new value of a store entry
pub(crate) type Subscriber = Rc<dyn Fn(&Value) -> HookResult<()>>;

struct StoreEntry {
    value: Value,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    queue: VecDeque<Value>,
    notifying: bool,
    link: Option<Cleanup>,
}

impl StoreEntry {
    fn new(value: Value) -> Self {
        Self {
            value,
            subscribers: Vec::new(),
            queue: VecDeque::new(),
            notifying: false,
            link: None,
        }
    }
}

/// Process-wide (per runtime) map of store entries
pub struct StoreRegistry {
    entries: RefCell<HashMap<String, StoreEntry>>,
    config: HooksConfig,
    scheduler: Scheduler,
    transport: Option<Rc<dyn Transport>>,
    weak_self: Weak<StoreRegistry>,
}

impl StoreRegistry {
    pub(crate) fn new(
        config: HooksConfig,
        scheduler: Scheduler,
        transport: Option<Rc<dyn Transport>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            entries: RefCell::new(HashMap::new()),
            config,
            scheduler,
            transport,
            weak_self: weak_self.clone(),
        })
    }

    /// Create the entry if absent; an existing entry keeps its value
    ///
    /// Returns whether the entry was created.
    pub(crate) fn ensure(
        &self,
        key: &str,
        init: impl FnOnce() -> HookResult<Value>,
    ) -> HookResult<bool> {
        if self.contains(key) {
            tracing::trace!(key, "store exists, keeping current value");
            return Ok(false);
        }
        let value = init()?;
        self.insert(key, value);
        Ok(true)
    }

    fn insert(&self, key: &str, value: Value) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), StoreEntry::new(value));
        tracing::debug!(key, "store created");
        self.link(key);
    }

    /// Attach the entry to its broadcast channel
    fn link(&self, key: &str) {
        let Some(transport) = self.transport.as_ref().filter(|_| self.config.broadcast) else {
            return;
        };
        let registry = self.weak_self.clone();
        let owned = key.to_string();
        let handler: RemoteHandler = Rc::new(move |value: Value| {
            if let Some(registry) = registry.upgrade() {
                registry.apply_remote(&owned, value);
            }
        });
        let cleanup = transport.subscribe(&self.config.channel_name(key), handler);
        if let Some(entry) = self.entries.borrow_mut().get_mut(key) {
            entry.link = Some(cleanup);
        }
    }

    fn apply_remote(&self, key: &str, value: Value) {
        tracing::debug!(key, "applying remote update");
        if let Err(err) = self.set(key, value, Origin::Remote) {
            self.scheduler.report(err);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Current value, creating a `null` entry on first access
    pub fn get(&self, key: &str) -> Value {
        if let Some(entry) = self.entries.borrow().get(key) {
            return entry.value.clone();
        }
        self.insert(key, Value::Null);
        Value::Null
    }

    /// Replace the value of an entry and notify its subscribers
    pub fn set(&self, key: &str, value: Value, origin: Origin) -> HookResult<()> {
        let (start, created) = {
            let mut entries = self.entries.borrow_mut();
            let created = !entries.contains_key(key);
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| StoreEntry::new(Value::Null));
            if !created && entry.value == value {
                tracing::trace!(key, "store value unchanged");
                return Ok(());
            }
            entry.value = value.clone();
            entry.queue.push_back(value.clone());
            let start = !entry.notifying;
            entry.notifying = true;
            (start, created)
        };

        if created {
            tracing::debug!(key, "store created");
            self.link(key);
        }
        tracing::debug!(key, ?origin, "store updated");

        if origin == Origin::Local {
            self.publish(key, &value);
        }
        if start {
            self.drain(key);
        }
        Ok(())
    }

    fn publish(&self, key: &str, value: &Value) {
        let Some(transport) = self.transport.as_ref().filter(|_| self.config.broadcast) else {
            return;
        };
        if let Err(err) = transport.publish(&self.config.channel_name(key), value) {
            tracing::warn!(key, error = %err, "broadcast failed");
            self.scheduler.report(err);
        }
    }

    /// Run queued notification rounds until the queue is empty
    fn drain(&self, key: &str) {
        let limit = self.config.max_store_cascade.max(1);
        let mut rounds = 0;

        loop {
            let (value, subscribers) = {
                let mut entries = self.entries.borrow_mut();
                let Some(entry) = entries.get_mut(key) else {
                    return;
                };
                let Some(value) = entry.queue.pop_front() else {
                    entry.notifying = false;
                    return;
                };
                rounds += 1;
                if rounds > limit {
                    entry.queue.clear();
                    entry.notifying = false;
                    drop(entries);
                    tracing::warn!(key, rounds = limit, "store update cascade cut off");
                    self.scheduler.report(HookError::CascadeLimit {
                        key: key.to_string(),
                        rounds: limit,
                    });
                    return;
                }
                (value, entry.subscribers.clone())
            };

            for (id, subscriber) in subscribers {
                if let Err(err) = subscriber(&value) {
                    tracing::warn!(key, subscription = %id, error = %err, "store subscriber failed");
                    self.scheduler.report(HookError::Subscriber {
                        key: key.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    /// Register a subscriber, creating the entry if needed
    pub(crate) fn subscribe(&self, key: &str, subscriber: Subscriber) -> SubscriptionId {
        if !self.contains(key) {
            self.insert(key, Value::Null);
        }
        let id = SubscriptionId::new();
        if let Some(entry) = self.entries.borrow_mut().get_mut(key) {
            entry.subscribers.push((id, subscriber));
        }
        tracing::trace!(key, subscription = %id, "subscribed");
        id
    }

    /// Subscribe and get back a cleanup that unsubscribes
    pub(crate) fn subscribe_scoped(
        &self,
        key: &str,
        subscriber: Subscriber,
    ) -> (SubscriptionId, Cleanup) {
        let id = self.subscribe(key, subscriber);
        let registry = self.weak_self.clone();
        let key = key.to_string();
        let cleanup = Cleanup::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.unsubscribe(&key, id);
            }
        });
        (id, cleanup)
    }

    /// Whether `id` is still subscribed to `key`
    ///
    /// False once the entry was removed, even if it was created again.
    pub fn is_subscribed(&self, key: &str, id: SubscriptionId) -> bool {
        self.entries
            .borrow()
            .get(key)
            .is_some_and(|entry| entry.subscribers.iter().any(|(existing, _)| *existing == id))
    }

    /// Remove a subscriber; returns whether it was registered
    pub fn unsubscribe(&self, key: &str, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        let before = entry.subscribers.len();
        entry.subscribers.retain(|(existing, _)| *existing != id);
        before != entry.subscribers.len()
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .get(key)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Delete an entry and detach it from its channel
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.entries.borrow_mut().remove(key);
        match removed {
            Some(entry) => {
                if let Some(link) = entry.link {
                    link.run();
                }
                tracing::debug!(key, "store removed");
                true
            }
            None => false,
        }
    }

    /// Delete every entry
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        for (_, entry) in entries {
            if let Some(link) = entry.link {
                link.run();
            }
        }
    }

    /// Keys of every entry, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
