//! The hook context handed to component and action bodies
//!
//! Every hook claims the next slot of the running instance. Calling hooks
//! conditionally, or in a different order between invocations, is caught
//! as a [`HookError::HookOrder`](crate::HookError::HookOrder) the first
//! time a slot kind does not line up.

use crate::action::Action;
use crate::effect::{erase, EffectOutput, EffectTiming};
use crate::error::HookResult;
use crate::instance::{Instance, Slot, SlotKind, StoreSlot};
use crate::runtime::Runtime;
use crate::state::Setter;
use crate::store::Store;
use crate::types::InstanceId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;

/// Boxed body of a component or action
pub(crate) type HookBody<A, R> = Box<dyn FnMut(&mut Hooks<'_>, A) -> HookResult<R>>;

/// Run one invocation of `body` on `instance`
///
/// Sync effects run before this returns; deferred effects are queued for
/// the next tick. A failing body skips both.
pub(crate) fn invoke<A, R>(
    runtime: &Runtime,
    instance: &Instance,
    body: &mut dyn FnMut(&mut Hooks<'_>, A) -> HookResult<R>,
    args: A,
) -> HookResult<R> {
    instance.begin()?;
    let output = body(&mut Hooks::new(runtime, instance), args)?;
    instance.commit()?;
    Ok(output)
}

/// Per-invocation hook context
pub struct Hooks<'a> {
    runtime: &'a Runtime,
    instance: &'a Instance,
}

impl<'a> Hooks<'a> {
    pub(crate) fn new(runtime: &'a Runtime, instance: &'a Instance) -> Self {
        Self { runtime, instance }
    }

    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance.id()
    }

    /// Local state, initialized on the first invocation
    pub fn use_state<T>(&mut self, initial: T) -> HookResult<(T, Setter<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        self.use_state_with(move || initial)
    }

    /// Local state with a lazily computed initial value
    pub fn use_state_with<T, F>(&mut self, init: F) -> HookResult<(T, Setter<T>)>
    where
        T: Clone + PartialEq + 'static,
        F: FnOnce() -> T,
    {
        let index = self
            .instance
            .next_slot(SlotKind::State, || Slot::State(Box::new(init())))?;
        let value = self.instance.read_state::<T>(index)?;
        Ok((value, Setter::new(self.instance, index)))
    }

    /// Deferred effect that runs after every invocation
    pub fn use_effect<O, F>(&mut self, f: F) -> HookResult<()>
    where
        O: EffectOutput,
        F: FnOnce() -> O + 'static,
    {
        self.effect::<(), O, F>(EffectTiming::Deferred, None, f)
    }

    /// Deferred effect that reruns when `deps` changed
    ///
    /// `()` as the dependency list runs the effect once.
    pub fn use_effect_with<D, O, F>(&mut self, deps: D, f: F) -> HookResult<()>
    where
        D: PartialEq + 'static,
        O: EffectOutput,
        F: FnOnce() -> O + 'static,
    {
        self.effect(EffectTiming::Deferred, Some(deps), f)
    }

    /// Sync effect that runs before every invocation returns
    pub fn use_sync_effect<O, F>(&mut self, f: F) -> HookResult<()>
    where
        O: EffectOutput,
        F: FnOnce() -> O + 'static,
    {
        self.effect::<(), O, F>(EffectTiming::Sync, None, f)
    }

    /// Sync effect that reruns when `deps` changed
    pub fn use_sync_effect_with<D, O, F>(&mut self, deps: D, f: F) -> HookResult<()>
    where
        D: PartialEq + 'static,
        O: EffectOutput,
        F: FnOnce() -> O + 'static,
    {
        self.effect(EffectTiming::Sync, Some(deps), f)
    }

    /// Sync effect that runs once, on the first invocation
    ///
    /// A returned cleanup runs when the instance is unhooked.
    pub fn use_init<O, F>(&mut self, f: F) -> HookResult<()>
    where
        O: EffectOutput,
        F: FnOnce() -> O + 'static,
    {
        self.use_sync_effect_with((), f)
    }

    fn effect<D, O, F>(&mut self, timing: EffectTiming, deps: Option<D>, f: F) -> HookResult<()>
    where
        D: PartialEq + 'static,
        O: EffectOutput,
        F: FnOnce() -> O + 'static,
    {
        let index = self
            .instance
            .next_slot(timing.slot_kind(), || Slot::effect(timing))?;
        self.instance.stage_effect(index, deps, erase(f))?;
        Ok(())
    }

    /// Subscribe to a named store
    ///
    /// Any later change to the store re-invokes this instance. A store
    /// that does not exist yet is created holding `null`.
    pub fn use_store<T>(&mut self, key: &str) -> HookResult<(T, Store<T>)>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let index = self
            .instance
            .next_slot(SlotKind::Store, || Slot::Store(StoreSlot::new(key)))?;
        self.bind_store(index, key);

        let store = self.runtime.store::<T>(key);
        let value = store.get()?;
        Ok((value, store))
    }

    /// Subscribe to a named store, creating it with `initial` if absent
    pub fn use_store_or<T>(&mut self, key: &str, initial: T) -> HookResult<(T, Store<T>)>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.runtime.create_store(key, initial)?;
        self.use_store(key)
    }

    /// Point the store slot at `key`, subscribing again when the key moved
    /// or the entry it was subscribed to has been removed
    fn bind_store(&self, index: usize, key: &str) {
        let stores = self.runtime.stores();
        let stale = self
            .instance
            .with_slot(index, |slot| match slot {
                Slot::Store(bound) => {
                    bound.key != key
                        || !bound
                            .subscription_id()
                            .is_some_and(|id| stores.is_subscribed(key, id))
                }
                _ => false,
            })
            .unwrap_or(false);
        if !stale {
            return;
        }

        let previous = self.instance.with_slot(index, |slot| match slot {
            Slot::Store(bound) => {
                bound.key = key.to_string();
                bound.subscription.take()
            }
            _ => None,
        });
        if let Some((_, unsubscribe)) = previous.flatten() {
            unsubscribe.run();
        }

        let instance = self.instance.downgrade();
        let subscription = stores.subscribe_scoped(
            key,
            Rc::new(move |_: &Value| -> HookResult<()> {
                if let Some(instance) = instance.upgrade() {
                    instance.schedule_rerender();
                }
                Ok(())
            }),
        );
        tracing::trace!(instance = %self.instance.id(), key, "store slot bound");
        self.instance.with_slot(index, move |slot| {
            if let Slot::Store(bound) = slot {
                bound.subscription = Some(subscription);
            }
        });
    }

    /// Invoker for a registered action
    pub fn use_action<A, R>(&mut self, key: &str) -> HookResult<Action<A, R>>
    where
        A: 'static,
        R: 'static,
    {
        self.instance
            .next_slot(SlotKind::Action, || Slot::Action(key.to_string()))?;
        self.runtime.action(key)
    }

    /// Invoker for an action, registering `body` under `key` if absent
    pub fn use_action_with<A, R, F>(&mut self, key: &str, body: F) -> HookResult<Action<A, R>>
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut Hooks<'_>, A) -> HookResult<R> + 'static,
    {
        self.instance
            .next_slot(SlotKind::Action, || Slot::Action(key.to_string()))?;
        if self.runtime.has_action(key) {
            self.runtime.action(key)
        } else {
            Ok(self.runtime.create_action(key, body))
        }
    }
}
