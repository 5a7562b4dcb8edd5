//! In-memory storage, a stand-in for browser-style local storage

use crate::{Storage, StorageError, WatchHandler};
use hookwire::{Cleanup, SubscriptionId};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

type Watchers = HashMap<String, Vec<(SubscriptionId, WatchHandler)>>;

/// Storage backed by a map in memory
///
/// Writes through [`Storage::set`] come from this context and are not
/// reported to watchers; [`write_external`](MemoryStorage::write_external)
/// plays the part of another context writing the same key.
#[derive(Default)]
pub struct MemoryStorage {
    values: RefCell<HashMap<String, Value>>,
    watchers: Rc<RefCell<Watchers>>,
    writes: Cell<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without counting it as a write
    pub fn insert(&self, key: &str, value: Value) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }

    /// Store `value` as if another context wrote it, notifying watchers
    pub fn write_external(&self, key: &str, value: Value) {
        self.insert(key, value.clone());
        let handlers: Vec<WatchHandler> = self
            .watchers
            .borrow()
            .get(key)
            .map(|list| list.iter().map(|(_, handler)| Rc::clone(handler)).collect())
            .unwrap_or_default();
        tracing::debug!(key, watchers = handlers.len(), "external write");
        for handler in handlers {
            handler(value.clone());
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.borrow_mut().remove(key)
    }

    /// Number of writes made through [`Storage::set`]
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn watcher_count(&self, key: &str) -> usize {
        self.watchers.borrow().get(key).map_or(0, Vec::len)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.values.borrow_mut().insert(key.to_string(), value.clone());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn watch(&self, key: &str, handler: WatchHandler) -> Option<Cleanup> {
        let id = SubscriptionId::new();
        self.watchers
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .push((id, handler));

        let watchers = Rc::downgrade(&self.watchers);
        let key = key.to_string();
        Some(Cleanup::new(move || {
            let Some(watchers) = watchers.upgrade() else {
                return;
            };
            let mut map = watchers.borrow_mut();
            if let Some(list) = map.get_mut(&key) {
                list.retain(|(existing, _)| *existing != id);
                if list.is_empty() {
                    map.remove(&key);
                }
            }
        }))
    }
}
