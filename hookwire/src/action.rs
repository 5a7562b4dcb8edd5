//! Actions - named, non-reactive hook bodies
//!
//! An action runs on its own instance, so it can use every hook, but that
//! instance is passive: state setters store values without re-invoking
//! anything, and the action only runs when somebody calls it.
//!
//! Actions are registered by key on the runtime and looked up with the
//! argument and return types they were registered with. An asynchronous
//! action simply returns a future; the caller decides whether to await it.

use crate::error::{HookError, HookResult};
use crate::hooks::{invoke, HookBody, Hooks};
use crate::instance::Instance;
use crate::runtime::{Runtime, WeakRuntime};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub(crate) struct ActionEntry<A, R> {
    key: Option<String>,
    instance: Rc<Instance>,
    body: RefCell<HookBody<A, R>>,
}

impl<A, R> ActionEntry<A, R> {
    fn describe(&self) -> String {
        self.instance.label().to_string()
    }
}

/// Invoker for an action
///
/// Cloning yields another invoker for the same action.
pub struct Action<A, R> {
    entry: Rc<ActionEntry<A, R>>,
    runtime: WeakRuntime,
}

impl<A, R> Clone for Action<A, R> {
    fn clone(&self) -> Self {
        Self {
            entry: Rc::clone(&self.entry),
            runtime: self.runtime.clone(),
        }
    }
}

impl<A, R> fmt::Debug for Action<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("key", &self.entry.key)
            .field("instance", &self.entry.instance.id())
            .finish()
    }
}

impl<A: 'static, R: 'static> Action<A, R> {
    pub(crate) fn new<F>(runtime: &Runtime, key: Option<&str>, body: F) -> Self
    where
        F: FnMut(&mut Hooks<'_>, A) -> HookResult<R> + 'static,
    {
        let label = match key {
            Some(key) => format!("action `{}`", key),
            None => "anonymous action".to_string(),
        };
        let entry = ActionEntry {
            key: key.map(str::to_string),
            instance: Instance::passive(label, runtime.scheduler().clone()),
            body: RefCell::new(Box::new(body)),
        };
        Self {
            entry: Rc::new(entry),
            runtime: runtime.downgrade(),
        }
    }

    /// Run the action body
    ///
    /// Calling an action from inside its own body is rejected with
    /// [`HookError::Reentrant`].
    pub fn call(&self, args: A) -> HookResult<R> {
        let runtime = self.runtime.upgrade().ok_or(HookError::Dropped("runtime"))?;
        let mut body = self
            .entry
            .body
            .try_borrow_mut()
            .map_err(|_| HookError::Reentrant(self.entry.describe()))?;
        tracing::debug!(action = %self.entry.describe(), "invoking");
        invoke(&runtime, &self.entry.instance, &mut **body, args)
    }

    pub fn key(&self) -> Option<&str> {
        self.entry.key.as_deref()
    }

    pub fn instance(&self) -> &Instance {
        &self.entry.instance
    }
}

struct Registered {
    entry: Rc<dyn Any>,
    instance: Rc<Instance>,
}

/// Key to action map owned by a runtime
#[derive(Default)]
pub(crate) struct ActionRegistry {
    entries: RefCell<HashMap<String, Registered>>,
}

impl ActionRegistry {
    /// Register an action under its key, replacing any previous one
    ///
    /// The replaced action's instance is unhooked.
    pub(crate) fn insert<A: 'static, R: 'static>(&self, key: &str, action: &Action<A, R>) {
        let registered = Registered {
            entry: Rc::clone(&action.entry) as Rc<dyn Any>,
            instance: Rc::clone(&action.entry.instance),
        };
        let previous = self.entries.borrow_mut().insert(key.to_string(), registered);
        if let Some(previous) = previous {
            tracing::debug!(key, "replacing action");
            previous.instance.teardown();
        }
    }

    pub(crate) fn get<A: 'static, R: 'static>(
        &self,
        key: &str,
        runtime: &Runtime,
    ) -> HookResult<Action<A, R>> {
        let entry = self
            .entries
            .borrow()
            .get(key)
            .map(|registered| Rc::clone(&registered.entry))
            .ok_or_else(|| HookError::UnknownAction(key.to_string()))?;
        let entry = entry
            .downcast::<ActionEntry<A, R>>()
            .map_err(|_| HookError::ActionType(key.to_string()))?;
        Ok(Action {
            entry,
            runtime: runtime.downgrade(),
        })
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub(crate) fn remove(&self, key: &str) -> bool {
        let removed = self.entries.borrow_mut().remove(key);
        match removed {
            Some(registered) => {
                registered.instance.teardown();
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        for (_, registered) in entries {
            registered.instance.teardown();
        }
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_action_state_persists_without_rerender() {
        let runtime = Runtime::with_defaults();
        let action = runtime.create_action("count", |hooks, ()| {
            let (count, set_count) = hooks.use_state(0)?;
            set_count.set(count + 1)?;
            Ok(count)
        });

        assert_eq!(action.call(()).unwrap(), 0);
        assert_eq!(action.call(()).unwrap(), 1);
        assert_eq!(action.call(()).unwrap(), 2);
        assert_eq!(runtime.scheduler().pending(), 0);
    }

    #[test]
    fn test_reentrant_call_is_rejected() {
        let runtime = Runtime::with_defaults();
        let inner_result = Rc::new(Cell::new(false));

        let flag = Rc::clone(&inner_result);
        let action = runtime.create_action("self", move |hooks, depth: u32| {
            if depth == 0 {
                let me = hooks.runtime().action::<u32, ()>("self")?;
                flag.set(matches!(me.call(1), Err(HookError::Reentrant(_))));
            }
            Ok(())
        });

        action.call(0).unwrap();
        assert!(inner_result.get());
    }

    #[test]
    fn test_lookup_with_wrong_types() {
        let runtime = Runtime::with_defaults();
        runtime.create_action("typed", |_hooks, n: u32| Ok(n * 2));

        assert!(runtime.action::<u32, u32>("typed").is_ok());
        assert!(matches!(
            runtime.action::<String, u32>("typed"),
            Err(HookError::ActionType(_))
        ));
    }

    #[test]
    fn test_replacing_unhooks_previous() {
        let runtime = Runtime::with_defaults();
        let first = runtime.create_action("a", |_hooks, ()| Ok(1));
        let second = runtime.create_action("a", |_hooks, ()| Ok(2));

        assert!(!first.instance().is_active());
        assert!(matches!(first.call(()), Err(HookError::Unhooked(_))));
        assert_eq!(second.call(()).unwrap(), 2);
        assert_eq!(runtime.action::<(), i32>("a").unwrap().call(()).unwrap(), 2);
    }
}
