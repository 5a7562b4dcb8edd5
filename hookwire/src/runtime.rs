//! Runtime coordinator for hooks
//!
//! The runtime owns:
//! - The scheduler (microtasks, local futures, unhandled errors)
//! - The store registry and its optional transport
//! - The action registry
//!
//! It is single threaded and cheap to clone; clones share everything.

use crate::action::{Action, ActionRegistry};
use crate::broadcast::Transport;
use crate::component::Component;
use crate::config::HooksConfig;
use crate::error::{HookError, HookResult};
use crate::hooks::Hooks;
use crate::scheduler::Scheduler;
use crate::store::{Store, StoreRegistry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::rc::{Rc, Weak};

struct RuntimeInner {
    config: HooksConfig,
    scheduler: Scheduler,
    stores: Rc<StoreRegistry>,
    actions: ActionRegistry,
    transport: Option<Rc<dyn Transport>>,
}

/// The main runtime coordinator
///
/// # Example
///
/// ```
/// use hookwire::Runtime;
///
/// let runtime = Runtime::with_defaults();
/// let counter = runtime.enhook(|hooks, ()| {
///     let (count, set_count) = hooks.use_state(0)?;
///     if count < 3 {
///         set_count.set(count + 1)?;
///     }
///     Ok(count)
/// });
///
/// assert_eq!(counter.call(()).unwrap(), 0);
/// runtime.run_until_idle().unwrap();
/// assert_eq!(counter.instance().invocations(), 4);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning runtime handle held by components and actions
#[derive(Clone)]
pub(crate) struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl Runtime {
    /// Create a runtime without a transport
    pub fn new(config: HooksConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a runtime with default configuration
    pub fn with_defaults() -> Self {
        Self::new(HooksConfig::default())
    }

    /// Create a runtime whose stores are propagated through `transport`
    pub fn with_transport(config: HooksConfig, transport: Rc<dyn Transport>) -> Self {
        Self::build(config, Some(transport))
    }

    fn build(config: HooksConfig, transport: Option<Rc<dyn Transport>>) -> Self {
        let scheduler = Scheduler::new();
        let stores = StoreRegistry::new(config.clone(), scheduler.clone(), transport.clone());
        tracing::debug!(broadcast = transport.is_some() && config.broadcast, "runtime created");
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                scheduler,
                stores,
                actions: ActionRegistry::default(),
                transport,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &HooksConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// The store registry, for untyped access
    pub fn stores(&self) -> &Rc<StoreRegistry> {
        &self.inner.stores
    }

    /// Wrap a function with a persistent hook instance
    pub fn enhook<A, R, F>(&self, body: F) -> Component<A, R>
    where
        A: Clone + 'static,
        R: 'static,
        F: FnMut(&mut Hooks<'_>, A) -> HookResult<R> + 'static,
    {
        Component::new(self, body)
    }

    /// Create a store holding `initial`
    ///
    /// An existing store keeps its current value.
    pub fn create_store<T>(&self, key: &str, initial: T) -> HookResult<Store<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.inner.stores.ensure(key, || {
            serde_json::to_value(initial).map_err(|err| HookError::serialization(key, err))
        })?;
        Ok(Store::new(key, &self.inner.stores))
    }

    /// Typed handle to a store; the entry is created on first access
    pub fn store<T>(&self, key: &str) -> Store<T>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        Store::new(key, &self.inner.stores)
    }

    pub fn has_store(&self, key: &str) -> bool {
        self.inner.stores.contains(key)
    }

    /// Delete a store and detach it from the transport
    pub fn remove_store(&self, key: &str) -> bool {
        self.inner.stores.remove(key)
    }

    /// Register an action under `key`, replacing any previous one
    pub fn create_action<A, R, F>(&self, key: &str, body: F) -> Action<A, R>
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut Hooks<'_>, A) -> HookResult<R> + 'static,
    {
        let action = Action::new(self, Some(key), body);
        self.inner.actions.insert(key, &action);
        tracing::debug!(key, "action registered");
        action
    }

    /// Create an action that is not registered under any key
    pub fn anonymous_action<A, R, F>(&self, body: F) -> Action<A, R>
    where
        A: 'static,
        R: 'static,
        F: FnMut(&mut Hooks<'_>, A) -> HookResult<R> + 'static,
    {
        Action::new(self, None, body)
    }

    /// Look up a registered action
    pub fn action<A, R>(&self, key: &str) -> HookResult<Action<A, R>>
    where
        A: 'static,
        R: 'static,
    {
        self.inner.actions.get(key, self)
    }

    pub fn has_action(&self, key: &str) -> bool {
        self.inner.actions.contains(key)
    }

    /// Unregister an action and unhook its instance
    pub fn remove_action(&self, key: &str) -> bool {
        self.inner.actions.remove(key)
    }

    /// Spawn a fire-and-forget future on the local pool
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = HookResult<()>> + 'static,
    {
        self.inner.scheduler.spawn(future);
    }

    fn pump(&self) -> usize {
        match &self.inner.transport {
            Some(transport) => transport.pump(),
            None => 0,
        }
    }

    /// Deliver inbound broadcasts, then run one scheduler tick
    ///
    /// Returns the number of microtasks executed.
    pub fn tick(&self) -> usize {
        let delivered = self.pump();
        if delivered > 0 {
            tracing::trace!(delivered, "delivered remote updates");
        }
        self.inner.scheduler.tick()
    }

    /// Tick until no microtask is queued and no broadcast is pending
    ///
    /// Fails with [`HookError::IdleLimit`] after `max_idle_rounds` ticks.
    pub fn run_until_idle(&self) -> HookResult<usize> {
        let limit = self.inner.config.max_idle_rounds;
        let mut total = 0;
        for _ in 0..limit {
            let delivered = self.pump();
            total += self.inner.scheduler.tick();
            if delivered == 0 && self.inner.scheduler.is_idle() {
                return Ok(total);
            }
        }
        tracing::warn!(rounds = limit, "runtime did not become idle");
        Err(HookError::IdleLimit(limit))
    }

    /// Drain errors nobody could be handed
    pub fn take_unhandled(&self) -> Vec<HookError> {
        self.inner.scheduler.take_unhandled()
    }

    /// Drop every store, action, queued microtask and channel
    ///
    /// Components stay hooked but lose their store subscriptions' entries.
    pub fn reset(&self) {
        self.inner.actions.clear();
        self.inner.stores.clear();
        self.inner.scheduler.clear();
        if let Some(transport) = &self.inner.transport {
            transport.close_all();
        }
        tracing::debug!("runtime reset");
    }

    /// Get statistics about the runtime
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            store_count: self.inner.stores.len(),
            action_count: self.inner.actions.len(),
            pending_tasks: self.inner.scheduler.pending(),
            ticks: self.inner.scheduler.ticks(),
        }
    }

    /// Keys of every registered action, sorted
    pub fn action_keys(&self) -> Vec<String> {
        self.inner.actions.keys()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Statistics about the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Number of store entries
    pub store_count: usize,
    /// Number of registered actions
    pub action_count: usize,
    /// Microtasks waiting for the next tick
    pub pending_tasks: usize,
    /// Ticks run so far
    pub ticks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastHub;
    use serde_json::json;

    #[test]
    fn test_runtime_creation() {
        let runtime = Runtime::with_defaults();
        let stats = runtime.stats();
        assert_eq!(stats.store_count, 0);
        assert_eq!(stats.action_count, 0);
        assert_eq!(stats.pending_tasks, 0);
    }

    #[test]
    fn test_store_creation() {
        let runtime = Runtime::with_defaults();

        let store = runtime.create_store("test", 1).unwrap();
        assert!(runtime.has_store("test"));
        assert_eq!(runtime.stats().store_count, 1);

        // Creating the same store again keeps the value
        runtime.create_store("test", 2).unwrap();
        assert_eq!(store.get().unwrap(), 1);
        assert_eq!(runtime.stats().store_count, 1);

        assert!(runtime.remove_store("test"));
        assert!(!runtime.has_store("test"));
    }

    #[test]
    fn test_unknown_action() {
        let runtime = Runtime::with_defaults();
        let result = runtime.action::<(), ()>("nope");
        assert!(matches!(result, Err(HookError::UnknownAction(key)) if key == "nope"));
    }

    #[test]
    fn test_run_until_idle_limit() {
        let config = HooksConfig {
            max_idle_rounds: 3,
            ..HooksConfig::default()
        };
        let runtime = Runtime::new(config);
        let component = runtime.enhook(|hooks, ()| {
            let (n, set_n) = hooks.use_state(0u64)?;
            set_n.set(n + 1)?;
            Ok(())
        });

        component.call(()).unwrap();
        assert!(matches!(runtime.run_until_idle(), Err(HookError::IdleLimit(3))));
        component.unhook();
        assert!(runtime.run_until_idle().is_ok());
    }

    #[test]
    fn test_reset_clears_registries() {
        let runtime = Runtime::with_defaults();
        runtime.create_store("s", json!(null)).unwrap();
        runtime.create_action("a", |_hooks, ()| Ok(()));
        runtime.scheduler().queue(|| {});

        runtime.reset();
        let stats = runtime.stats();
        assert_eq!((stats.store_count, stats.action_count, stats.pending_tasks), (0, 0, 0));
    }

    #[test]
    fn test_transport_propagation() {
        let hub = BroadcastHub::new();
        let left = Runtime::with_transport(HooksConfig::default(), Rc::new(hub.connect()));
        let right = Runtime::with_transport(HooksConfig::default(), Rc::new(hub.connect()));

        let left_store = left.create_store("shared", 0).unwrap();
        let right_store = right.create_store("shared", 0).unwrap();

        left_store.set(7).unwrap();
        assert_eq!(right_store.get().unwrap(), 0);
        right.run_until_idle().unwrap();
        assert_eq!(right_store.get().unwrap(), 7);

        // Applying a remote update does not echo it back
        left.run_until_idle().unwrap();
        assert_eq!(left_store.get().unwrap(), 7);
    }

    #[test]
    fn test_broadcast_disabled() {
        let hub = BroadcastHub::new();
        let config = HooksConfig {
            broadcast: false,
            ..HooksConfig::default()
        };
        let left = Runtime::with_transport(config, Rc::new(hub.connect()));
        let right = Runtime::with_transport(HooksConfig::default(), Rc::new(hub.connect()));

        let left_store = left.create_store("shared", 0).unwrap();
        let right_store = right.create_store("shared", 0).unwrap();
        left_store.set(1).unwrap();
        right.run_until_idle().unwrap();

        assert_eq!(right_store.get().unwrap(), 0);
    }
}
