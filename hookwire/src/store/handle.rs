//! Typed store handles

use super::{StoreRegistry, Subscriber};
use crate::broadcast::Origin;
use crate::error::{HookError, HookResult};
use crate::types::SubscriptionId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

/// Typed view of one store entry
///
/// Values travel through the registry as JSON; the handle converts them to
/// and from `T` with serde on every access.
pub struct Store<T> {
    key: Rc<str>,
    registry: Weak<StoreRegistry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            key: Rc::clone(&self.key),
            registry: self.registry.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("key", &self.key).finish()
    }
}

impl<T> Store<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub(crate) fn new(key: &str, registry: &Rc<StoreRegistry>) -> Self {
        Self {
            key: Rc::from(key),
            registry: Rc::downgrade(registry),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn registry(&self) -> HookResult<Rc<StoreRegistry>> {
        self.registry.upgrade().ok_or(HookError::Dropped("runtime"))
    }

    /// Current value
    pub fn get(&self) -> HookResult<T> {
        let value = self.registry()?.get(&self.key);
        serde_json::from_value(value).map_err(|err| HookError::serialization(&self.key, err))
    }

    /// Current value as JSON
    pub fn get_raw(&self) -> HookResult<Value> {
        Ok(self.registry()?.get(&self.key))
    }

    /// Replace the value and notify every subscriber
    pub fn set(&self, value: T) -> HookResult<()> {
        let value = serde_json::to_value(value).map_err(|err| HookError::serialization(&self.key, err))?;
        self.registry()?.set(&self.key, value, Origin::Local)
    }

    /// Replace the value with one computed from the current value
    pub fn update(&self, f: impl FnOnce(T) -> T) -> HookResult<()> {
        let current = self.get()?;
        self.set(f(current))
    }

    /// Be notified with every new value
    ///
    /// A value that does not deserialize into `T` is reported as a
    /// subscriber failure.
    pub fn subscribe(&self, f: impl Fn(T) -> HookResult<()> + 'static) -> HookResult<SubscriptionId> {
        let key = Rc::clone(&self.key);
        let subscriber: Subscriber = Rc::new(move |value: &Value| -> HookResult<()> {
            let typed = serde_json::from_value(value.clone())
                .map_err(|err| HookError::serialization(&key, err))?;
            f(typed)
        });
        Ok(self.registry()?.subscribe(&self.key, subscriber))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.unsubscribe(&self.key, id))
    }
}
