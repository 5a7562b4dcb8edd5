//! Integration tests for named stores and their subscribers

mod common;

use common::{init_tracing, log, snapshot};
use hookwire::{HookError, HookResult, Runtime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Foo {
    bar: String,
}

fn foo(bar: &str) -> Foo {
    Foo { bar: bar.to_string() }
}

#[test]
fn test_store_update_reinvokes_subscriber() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    runtime.create_store("foo", foo("baz")).unwrap();

    let sink = Rc::clone(&log);
    let component = runtime.enhook(move |hooks, ()| {
        let (value, store) = hooks.use_store::<Foo>("foo")?;
        sink.borrow_mut().push(value);
        hooks.use_effect_with((), move || store.set(foo("qux")))?;
        Ok(())
    });

    component.call(()).unwrap();
    runtime.run_until_idle().unwrap();

    assert_eq!(snapshot(&log), vec![foo("baz"), foo("qux")]);
}

#[test]
fn test_store_is_shared_between_instances() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    let reader = |name: &'static str| {
        let sink = Rc::clone(&log);
        runtime.enhook(move |hooks, ()| {
            let (count, _store) = hooks.use_store_or::<u32>("count", 0)?;
            sink.borrow_mut().push(format!("{} {}", name, count));
            Ok(())
        })
    };
    let a = reader("a");
    let b = reader("b");

    a.call(()).unwrap();
    b.call(()).unwrap();
    runtime.store::<u32>("count").set(5).unwrap();
    runtime.run_until_idle().unwrap();

    assert_eq!(snapshot(&log), vec!["a 0", "b 0", "a 5", "b 5"]);
}

#[test]
fn test_use_store_or_keeps_existing_value() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    runtime.create_store("name", "first".to_string()).unwrap();

    let component = runtime.enhook(|hooks, ()| {
        let (name, _store) = hooks.use_store_or("name", "second".to_string())?;
        Ok(name)
    });

    assert_eq!(component.call(()).unwrap(), "first");
}

#[test]
fn test_missing_store_reads_as_null() {
    init_tracing();
    let runtime = Runtime::with_defaults();

    let component = runtime.enhook(|hooks, ()| {
        let (value, _store) = hooks.use_store::<Option<u32>>("nothing")?;
        Ok(value)
    });

    assert_eq!(component.call(()).unwrap(), None);
    assert!(runtime.has_store("nothing"));
}

#[test]
fn test_unhook_unsubscribes() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let component = runtime.enhook(|hooks, ()| {
        hooks.use_store_or("k", 1)?;
        Ok(())
    });

    component.call(()).unwrap();
    assert_eq!(runtime.stores().subscriber_count("k"), 1);

    component.call(()).unwrap();
    assert_eq!(runtime.stores().subscriber_count("k"), 1);

    component.unhook();
    assert_eq!(runtime.stores().subscriber_count("k"), 0);
}

#[test]
fn test_changing_key_moves_subscription() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let component = runtime.enhook(|hooks, key: &'static str| {
        hooks.use_store::<serde_json::Value>(key)?;
        Ok(())
    });

    component.call("left").unwrap();
    assert_eq!(runtime.stores().subscriber_count("left"), 1);

    component.call("right").unwrap();
    assert_eq!(runtime.stores().subscriber_count("left"), 0);
    assert_eq!(runtime.stores().subscriber_count("right"), 1);
}

#[test]
fn test_equal_store_value_does_not_reinvoke() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    let sink = Rc::clone(&log);
    let component = runtime.enhook(move |hooks, ()| {
        let (value, _store) = hooks.use_store_or("items", vec![1, 2])?;
        sink.borrow_mut().push(value);
        Ok(())
    });

    component.call(()).unwrap();
    runtime.store("items").set(vec![1, 2]).unwrap();
    runtime.run_until_idle().unwrap();

    assert_eq!(snapshot(&log), vec![vec![1, 2]]);
}

#[test]
fn test_store_updates_coalesce_into_one_reinvocation() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    let sink = Rc::clone(&log);
    let component = runtime.enhook(move |hooks, ()| {
        let (n, _store) = hooks.use_store_or::<u32>("n", 0)?;
        sink.borrow_mut().push(n);
        Ok(())
    });

    component.call(()).unwrap();
    let store = runtime.store::<u32>("n");
    store.set(1).unwrap();
    store.set(2).unwrap();
    store.set(3).unwrap();
    runtime.run_until_idle().unwrap();

    assert_eq!(snapshot(&log), vec![0, 3]);
}

#[test]
fn test_typed_subscriber_sees_every_value_in_order() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    let store = runtime.create_store("n", 0u32).unwrap();
    let sink = Rc::clone(&log);
    let feedback = store.clone();
    store
        .subscribe(move |value: u32| -> HookResult<()> {
            sink.borrow_mut().push(value);
            if value < 3 {
                feedback.set(value + 1)?;
            }
            Ok(())
        })
        .unwrap();

    store.set(1).unwrap();
    assert_eq!(snapshot(&log), vec![1, 2, 3]);
    assert_eq!(store.get().unwrap(), 3);
}

#[test]
fn test_runaway_cascade_is_reported() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let limit = runtime.config().max_store_cascade;

    let store = runtime.create_store("spin", 0u64).unwrap();
    let feedback = store.clone();
    store
        .subscribe(move |value: u64| feedback.set(value + 1))
        .unwrap();

    store.set(1).unwrap();
    let unhandled = runtime.take_unhandled();
    assert!(matches!(
        unhandled.as_slice(),
        [HookError::CascadeLimit { key, rounds }] if key == "spin" && *rounds == limit
    ));
}

#[test]
fn test_subscriber_failure_does_not_block_others() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let log = log();

    let store = runtime.create_store("k", json!(null)).unwrap();
    store
        .subscribe(|_: serde_json::Value| -> HookResult<()> { Err(HookError::Transport("closed".into())) })
        .unwrap();
    let sink = Rc::clone(&log);
    store
        .subscribe(move |value: serde_json::Value| -> HookResult<()> {
            sink.borrow_mut().push(value);
            Ok(())
        })
        .unwrap();

    store.set(json!("hello")).unwrap();

    assert_eq!(snapshot(&log), vec![json!("hello")]);
    assert!(matches!(
        runtime.take_unhandled().as_slice(),
        [HookError::Subscriber { key, .. }] if key == "k"
    ));
}

#[test]
fn test_reset_drops_stores() {
    init_tracing();
    let runtime = Runtime::with_defaults();
    let store = runtime.create_store("k", 1).unwrap();

    runtime.reset();

    assert!(!runtime.has_store("k"));
    // The handle recreates the entry as null on next access
    assert!(matches!(store.get(), Err(HookError::Serialization { .. })));
    assert_eq!(runtime.stores().keys(), vec!["k".to_string()]);
}

/// Subscribe a component, drop its store with `drop_store`, call again,
/// and check that a later update still reaches it
fn assert_resubscribes(drop_store: impl Fn(&Runtime)) {
    let runtime = Runtime::with_defaults();
    let log = log();

    let sink = Rc::clone(&log);
    let component = runtime.enhook(move |hooks, ()| {
        let (value, _store) = hooks.use_store_or::<u32>("k", 0)?;
        sink.borrow_mut().push(value);
        Ok(())
    });

    component.call(()).unwrap();
    drop_store(&runtime);
    component.call(()).unwrap();
    assert_eq!(runtime.stores().subscriber_count("k"), 1);

    runtime.store::<u32>("k").set(9).unwrap();
    runtime.run_until_idle().unwrap();
    assert_eq!(snapshot(&log), vec![0, 0, 9]);
}

#[test]
fn test_resubscribes_after_remove_store() {
    init_tracing();
    assert_resubscribes(|runtime| {
        assert!(runtime.remove_store("k"));
    });
}

#[test]
fn test_resubscribes_after_reset() {
    init_tracing();
    assert_resubscribes(|runtime| runtime.reset());
}

#[test]
fn test_dropped_component_releases_subscription() {
    init_tracing();
    let runtime = Runtime::with_defaults();

    let component = runtime.enhook(|hooks, ()| {
        hooks.use_store_or::<u32>("k", 0)?;
        Ok(())
    });
    component.call(()).unwrap();
    assert_eq!(runtime.stores().subscriber_count("k"), 1);

    drop(component);
    assert_eq!(runtime.stores().subscriber_count("k"), 0);
    runtime.store::<u32>("k").set(1).unwrap();
    runtime.run_until_idle().unwrap();
}
