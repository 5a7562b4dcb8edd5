//! Integration tests for the action registry

mod common;

use common::{init_tracing, log, snapshot};
use futures::executor::block_on;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use hookwire::{yield_now, Detached, HookError, HookResult, Hooks, Runtime};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

type Pending = LocalBoxFuture<'static, HookResult<()>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Foo {
    bar: String,
}

fn foo(bar: &str) -> Foo {
    Foo { bar: bar.to_string() }
}

#[test]
fn test_action_basic() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    runtime.create_store("foo", foo("baz")).unwrap();

    let sink = Rc::clone(&log);
    runtime.create_action("foo", move |hooks, ()| {
        let (value, store) = hooks.use_store::<Foo>("foo")?;
        sink.borrow_mut().push(value);
        hooks.use_effect_with((), move || store.set(foo("qux")))?;
        Ok(())
    });

    let f = runtime.enhook(|hooks, ()| {
        let action = hooks.use_action::<(), ()>("foo")?;
        action.call(())
    });

    f.call(()).unwrap();
    runtime.run_until_idle().unwrap();
    assert_eq!(snapshot(&log), vec![foo("baz")]);

    f.call(()).unwrap();
    assert_eq!(snapshot(&log), vec![foo("baz"), foo("qux")]);
    runtime.run_until_idle().unwrap();
}

#[test]
fn test_async_action_setting_store_does_not_deadlock() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    let items = runtime.create_store("items", vec![0usize]).unwrap();

    let sink = Rc::clone(&log);
    let push = runtime.create_action("push", move |hooks: &mut Hooks<'_>, ()| -> HookResult<Pending> {
        let (items, store) = hooks.use_store::<Vec<usize>>("items")?;
        sink.borrow_mut().push(items.len());
        Ok(async move {
            yield_now().await;
            let mut next = items.clone();
            next.push(items.len());
            store.set(next)
        }
        .boxed_local())
    });

    let f = runtime.enhook(move |hooks, ()| {
        let push = push.clone();
        hooks.use_effect(move || -> HookResult<Detached<Pending>> {
            Ok(Detached::new(push.call(())?))
        })?;
        Ok(())
    });

    f.call(()).unwrap();
    runtime.run_until_idle().unwrap();
    assert_eq!(snapshot(&log), vec![1]);

    f.call(()).unwrap();
    runtime.run_until_idle().unwrap();
    assert_eq!(snapshot(&log), vec![1, 2]);
    assert_eq!(items.get().unwrap(), vec![0, 1, 2]);
    assert!(runtime.take_unhandled().is_empty());
}

#[test]
fn test_async_action_is_awaited_by_caller() {
    init_tracing();
    let runtime = Runtime::with_defaults();

    let double = runtime.create_action("double", |_hooks, n: u32| {
        Ok(async move {
            yield_now().await;
            Ok::<u32, HookError>(n * 2)
        }
        .boxed_local())
    });

    let result = block_on(double.call(21).unwrap());
    assert_eq!(result.unwrap(), 42);
}

#[test]
fn test_async_action_failure_reaches_awaiter() {
    init_tracing();
    let runtime = Runtime::with_defaults();

    let fail = runtime.create_action("fail", |_hooks, ()| -> HookResult<Pending> {
        Ok(async { Err::<(), _>(HookError::AsyncRejection("nope".into())) }.boxed_local())
    });

    let result = block_on(fail.call(()).unwrap());
    assert!(matches!(result, Err(HookError::AsyncRejection(_))));
}

#[test]
fn test_actions_are_not_reactive() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    let sink = Rc::clone(&log);
    let action = runtime.anonymous_action(move |hooks, ()| {
        let (x, set_x) = hooks.use_state(0)?;
        sink.borrow_mut().push(x);
        set_x.set(x + 1)?;
        Ok(())
    });

    action.call(()).unwrap();
    assert_eq!(snapshot(&log), vec![0]);
    action.call(()).unwrap();
    assert_eq!(snapshot(&log), vec![0, 1]);
    action.call(()).unwrap();
    assert_eq!(snapshot(&log), vec![0, 1, 2]);
    assert_eq!(runtime.scheduler().pending(), 0);
}

#[test]
fn test_actions_are_not_reactive_with_vec() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    let sink = Rc::clone(&log);
    let action = runtime.anonymous_action(move |hooks, ()| {
        let (x, set_x) = hooks.use_state(vec![0usize])?;
        sink.borrow_mut().push(x.len());
        let mut next = x.clone();
        next.push(x.len());
        set_x.set(next)?;
        Ok(())
    });

    for _ in 0..3 {
        action.call(()).unwrap();
    }
    assert_eq!(snapshot(&log), vec![1, 2, 3]);
}

#[test]
fn test_action_passes_args() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    let sink = Rc::clone(&log);
    runtime.create_action("args", move |_hooks, (a, b, c): (i32, i32, i32)| {
        sink.borrow_mut().extend([a, b, c]);
        Ok(())
    });

    runtime
        .enhook(|hooks, ()| {
            let action = hooks.use_action::<(i32, i32, i32), ()>("args")?;
            action.call((1, 2, 3))
        })
        .call(())
        .unwrap();

    assert_eq!(snapshot(&log), vec![1, 2, 3]);
}

#[test]
fn test_unknown_action_fails() {
    init_tracing();
    let runtime = Runtime::with_defaults();

    let component = runtime.enhook(|hooks, ()| {
        hooks.use_action::<(), ()>("xxx")?;
        Ok(())
    });

    let result = component.call(());
    assert!(matches!(result, Err(HookError::UnknownAction(key)) if key == "xxx"));
}

#[test]
fn test_action_state_is_shared_across_callers() {
    init_tracing();
    let runtime = Runtime::with_defaults();

    let make_caller = |runtime: &Runtime| {
        runtime.enhook(|hooks, ()| {
            let next = hooks.use_action_with("counter", |hooks: &mut Hooks<'_>, ()| {
                let (n, set_n) = hooks.use_state(0u32)?;
                set_n.set(n + 1)?;
                Ok(n + 1)
            })?;
            next.call(())
        })
    };

    let a = make_caller(&runtime);
    let b = make_caller(&runtime);

    assert_eq!(a.call(()).unwrap(), 1);
    assert_eq!(b.call(()).unwrap(), 2);
    assert_eq!(a.call(()).unwrap(), 3);
    assert_eq!(runtime.action_keys(), vec!["counter".to_string()]);
}

#[test]
fn test_remove_action() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let action = runtime.create_action("gone", |_hooks, ()| Ok(()));

    assert!(runtime.remove_action("gone"));
    assert!(!runtime.has_action("gone"));
    assert!(matches!(action.call(()), Err(HookError::Unhooked(_))));
    assert!(matches!(
        runtime.action::<(), ()>("gone"),
        Err(HookError::UnknownAction(_))
    ));
}
