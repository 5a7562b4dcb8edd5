//! Hooks that mirror instance state into a [`Storage`]

use crate::{CookieJar, Storage, StorageError, WatchHandler};
use hookwire::{ByRef, Cleanup, HookError, HookResult, Hooks, Scheduler, Setter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type PlannedWrite = ByRef<RefCell<Option<Cleanup>>>;

/// Setter side of a persistent state hook
///
/// Updating through the handle re-invokes the instance like a plain state
/// setter and plans a write of the latest value to the backing store.
pub struct StorageHandle<T> {
    key: Rc<str>,
    storage: Rc<dyn Storage>,
    setter: Setter<T>,
    scheduler: Scheduler,
    planned: PlannedWrite,
}

impl<T> Clone for StorageHandle<T> {
    fn clone(&self) -> Self {
        Self {
            key: Rc::clone(&self.key),
            storage: Rc::clone(&self.storage),
            setter: self.setter.clone(),
            scheduler: self.scheduler.clone(),
            planned: self.planned.clone(),
        }
    }
}

impl<T> fmt::Debug for StorageHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandle")
            .field("key", &self.key)
            .field("write_planned", &self.is_write_planned())
            .finish()
    }
}

impl<T> StorageHandle<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a write is waiting for the next tick
    pub fn is_write_planned(&self) -> bool {
        self.planned.borrow().is_some()
    }

    fn cancel_write(&self) {
        if let Some(cancel) = self.planned.borrow_mut().take() {
            cancel.run();
        }
    }

    /// Replace any planned write with one storing `value`
    fn plan_write(&self, value: Value) {
        self.cancel_write();

        let storage = Rc::clone(&self.storage);
        let key = Rc::clone(&self.key);
        let scheduler = self.scheduler.clone();
        let planned = self.planned.clone();
        let task = Box::new(move || {
            planned.borrow_mut().take();
            if let Err(err) = write_through(&*storage, &key, &value) {
                tracing::warn!(key = %key, error = %err, "storage write failed");
                scheduler.report(err.into());
            }
        });

        let cancel = self.storage.plan(&self.scheduler, task);
        *self.planned.borrow_mut() = Some(cancel);
    }
}

impl<T> StorageHandle<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    /// Current state
    pub fn get(&self) -> HookResult<T> {
        self.setter.get()
    }

    /// Update the state and write it back on the next tick
    pub fn set(&self, value: T) -> HookResult<()> {
        let json = serde_json::to_value(&value).map_err(StorageError::from)?;
        self.setter.set(value)?;
        self.plan_write(json);
        Ok(())
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) -> HookResult<()> {
        let next = f(&self.get()?);
        self.set(next)
    }

    /// Take a value that is already stored, without writing it back
    ///
    /// A write still waiting for the next tick is dropped.
    pub fn fetch(&self, value: T) -> HookResult<bool> {
        self.cancel_write();
        self.setter.set(value)
    }
}

fn write_through(storage: &dyn Storage, key: &str, value: &Value) -> Result<(), StorageError> {
    let stored = match storage.text(key) {
        Some(text) => Some(Value::String(text)),
        None => storage.get(key)?,
    };
    if let Some(stored) = stored {
        if storage.is(&stored, value) {
            tracing::trace!(key, "stored value unchanged, skipping write");
            return Ok(());
        }
    }
    storage.set(key, value)?;
    tracing::debug!(key, "stored");
    Ok(())
}

/// Typed value under `key`, falling back to the stored text as a string
fn load<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Result<Option<T>, StorageError> {
    let Some(value) = storage.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(typed) => Ok(Some(typed)),
        Err(err) => match storage.text(key) {
            Some(text) => serde_json::from_value(Value::String(text))
                .map(Some)
                .map_err(|_| err.into()),
            None => Err(err.into()),
        },
    }
}

/// State initialized from `storage` and written back on every update
///
/// The stored value under `key` wins over `init` on the first invocation.
/// A stored value that cannot be read is reported on the unhandled channel
/// and `init` is used instead.
pub fn use_storage<T>(
    hooks: &mut Hooks<'_>,
    storage: Rc<dyn Storage>,
    key: &str,
    init: T,
) -> HookResult<(T, StorageHandle<T>)>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    let mut failure = None;
    let (value, setter) = hooks.use_state_with(|| match load::<T>(&*storage, key) {
        Ok(Some(stored)) => stored,
        Ok(None) => init,
        Err(err) => {
            failure = Some(err);
            init
        }
    })?;
    let (planned, _) = hooks.use_state_with(|| ByRef::new(RefCell::new(None)))?;

    let scheduler = hooks.runtime().scheduler().clone();
    if let Some(err) = failure {
        tracing::warn!(key, error = %err, "could not load stored value");
        scheduler.report(err.into());
    }

    let handle = StorageHandle {
        key: Rc::from(key),
        storage,
        setter,
        scheduler,
        planned,
    };
    Ok((value, handle))
}

/// [`use_storage`] that also follows writes made by other contexts
///
/// Outside writes update the state without being written back.
pub fn use_local_storage<T>(
    hooks: &mut Hooks<'_>,
    storage: Rc<dyn Storage>,
    key: &str,
    init: T,
) -> HookResult<(T, StorageHandle<T>)>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    let (value, handle) = use_storage(hooks, Rc::clone(&storage), key, init)?;

    let watcher = handle.clone();
    let key = key.to_string();
    hooks.use_init(move || {
        let handler: WatchHandler = Rc::new(move |value: Value| {
            let result = serde_json::from_value::<T>(value)
                .map_err(|err| HookError::from(StorageError::from(err)))
                .and_then(|typed| watcher.fetch(typed));
            if let Err(err) = result {
                tracing::warn!(key = watcher.key(), error = %err, "could not apply outside write");
                watcher.scheduler.report(err);
            }
        });
        storage.watch(&key, handler)
    })?;

    Ok((value, handle))
}

/// [`use_storage`] over a cookie jar
pub fn use_cookie<T>(
    hooks: &mut Hooks<'_>,
    jar: Rc<CookieJar>,
    key: &str,
    init: T,
) -> HookResult<(T, StorageHandle<T>)>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + 'static,
{
    use_storage(hooks, jar, key, init)
}
