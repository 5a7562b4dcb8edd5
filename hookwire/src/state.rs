//! State slot setters

use crate::error::{HookError, HookResult};
use crate::instance::Instance;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Weak;

/// Setter half of a state hook
///
/// Cheap to clone and safe to keep past the invocation that returned it.
/// Setting a value equal to the current one is a no-op; anything else
/// stores the value and, on a reactive instance, queues one re-invocation
/// for the next tick.
pub struct Setter<T> {
    instance: Weak<Instance>,
    index: usize,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            index: self.index,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("index", &self.index).finish()
    }
}

impl<T> Setter<T>
where
    T: Clone + PartialEq + 'static,
{
    pub(crate) fn new(instance: &Instance, index: usize) -> Self {
        Self {
            instance: instance.downgrade(),
            index,
            _marker: PhantomData,
        }
    }

    /// Store a new value
    ///
    /// Returns whether the value changed. Writes to a dropped or unhooked
    /// instance are ignored.
    pub fn set(&self, value: T) -> HookResult<bool> {
        let Some(instance) = self.instance.upgrade() else {
            return Ok(false);
        };
        let changed = instance.write_state(self.index, value)?;
        if changed {
            instance.schedule_rerender();
        }
        Ok(changed)
    }

    /// Store a value computed from the current one
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> HookResult<bool> {
        let current = self.get()?;
        self.set(f(&current))
    }

    /// Current value of the slot
    pub fn get(&self) -> HookResult<T> {
        let instance = self.instance.upgrade().ok_or(HookError::Dropped("instance"))?;
        instance.read_state(self.index)
    }
}
