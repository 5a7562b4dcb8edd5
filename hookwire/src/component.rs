//! Components - hook bodies bound to a reactive instance

use crate::error::{HookError, HookResult};
use crate::hooks::{invoke, HookBody, Hooks};
use crate::instance::Instance;
use crate::runtime::{Runtime, WeakRuntime};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct ComponentInner<A, R> {
    runtime: WeakRuntime,
    instance: Rc<Instance>,
    body: RefCell<HookBody<A, R>>,
    last_args: RefCell<Option<A>>,
}

impl<A: Clone + 'static, R: 'static> ComponentInner<A, R> {
    fn call(&self, args: A) -> HookResult<R> {
        let runtime = self.runtime.upgrade().ok_or(HookError::Dropped("runtime"))?;
        let mut body = self
            .body
            .try_borrow_mut()
            .map_err(|_| HookError::Reentrant(self.instance.to_string()))?;
        *self.last_args.borrow_mut() = Some(args.clone());
        invoke(&runtime, &self.instance, &mut **body, args)
    }

    /// Re-invoke with the arguments of the last call
    fn rerender(&self) {
        let Some(args) = self.last_args.borrow().clone() else {
            return;
        };
        tracing::trace!(instance = %self.instance.id(), "re-invoking");
        if let Err(err) = self.call(args) {
            tracing::warn!(instance = %self.instance.id(), error = %err, "re-invocation failed");
            self.instance.scheduler().report(err);
        }
    }
}

/// A function wrapped with a persistent hook instance
///
/// Every [`call`](Component::call) resumes the same slots. State setters
/// and store updates re-invoke the body on the next tick with the
/// arguments of the most recent call; a re-invocation's return value is
/// discarded.
pub struct Component<A, R> {
    inner: Rc<ComponentInner<A, R>>,
}

impl<A, R> Clone for Component<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A, R> fmt::Debug for Component<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("instance", &self.inner.instance)
            .finish()
    }
}

impl<A: Clone + 'static, R: 'static> Component<A, R> {
    pub(crate) fn new<F>(runtime: &Runtime, body: F) -> Self
    where
        F: FnMut(&mut Hooks<'_>, A) -> HookResult<R> + 'static,
    {
        let inner = Rc::new(ComponentInner {
            runtime: runtime.downgrade(),
            instance: Instance::reactive("component", runtime.scheduler().clone()),
            body: RefCell::new(Box::new(body)),
            last_args: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        inner.instance.set_rerun(Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.rerender();
            }
        }));

        tracing::debug!(instance = %inner.instance.id(), "enhooked");
        Self { inner }
    }

    /// Invoke the body
    pub fn call(&self, args: A) -> HookResult<R> {
        self.inner.call(args)
    }

    /// Tear down the instance
    ///
    /// Runs every effect cleanup in slot order and drops store
    /// subscriptions. Re-invocations already queued become no-ops and
    /// later calls fail with [`HookError::Unhooked`].
    pub fn unhook(&self) {
        self.inner.instance.teardown();
    }

    pub fn is_active(&self) -> bool {
        self.inner.instance.is_active()
    }

    pub fn instance(&self) -> &Instance {
        &self.inner.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Cleanup;
    use std::cell::RefCell;

    #[test]
    fn test_setter_schedules_one_rerender() {
        let runtime = Runtime::with_defaults();
        let log = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&log);
        let component = runtime.enhook(move |hooks, ()| {
            let (value, set_value) = hooks.use_state(0)?;
            sink.borrow_mut().push(value);
            if value == 0 {
                set_value.set(1)?;
                set_value.set(2)?;
            }
            Ok(())
        });

        component.call(()).unwrap();
        assert_eq!(*log.borrow(), vec![0]);
        runtime.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec![0, 2]);
    }

    #[test]
    fn test_rerender_uses_last_args() {
        let runtime = Runtime::with_defaults();
        let log = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&log);
        let component = runtime.enhook(move |hooks, name: &'static str| {
            let (n, set_n) = hooks.use_state(0)?;
            sink.borrow_mut().push(format!("{}{}", name, n));
            if n == 0 {
                set_n.set(1)?;
            }
            Ok(())
        });

        component.call("a").unwrap();
        component.call("b").unwrap();
        runtime.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["a0", "b0", "b1"]);
    }

    #[test]
    fn test_unhook_runs_cleanups_in_slot_order() {
        let runtime = Runtime::with_defaults();
        let log = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&log);
        let component = runtime.enhook(move |hooks, ()| {
            for name in ["first", "second"] {
                let sink = Rc::clone(&sink);
                hooks.use_sync_effect_with((), move || {
                    Cleanup::new(move || sink.borrow_mut().push(name))
                })?;
            }
            Ok(())
        });

        component.call(()).unwrap();
        component.unhook();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert!(!component.is_active());
        assert!(matches!(component.call(()), Err(HookError::Unhooked(_))));
    }

    #[test]
    fn test_conditional_hook_is_rejected() {
        let runtime = Runtime::with_defaults();
        let component = runtime.enhook(|hooks, first: bool| {
            if first {
                hooks.use_state(0)?;
            }
            hooks.use_effect(|| ())?;
            Ok(())
        });

        component.call(true).unwrap();
        assert!(matches!(
            component.call(false),
            Err(HookError::HookOrder { index: 0, .. })
        ));
    }
}
