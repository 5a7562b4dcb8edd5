//! Hookwire - hook-style state and effects for plain functions
//!
//! This crate gives ordinary functions persistent per-instance state,
//! scheduled side effects and named shared state, in the style of UI hooks
//! but without any rendering layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Runtime                            │
//! │  (Coordinator - scheduler, stores, actions, transport)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐   ┌──────────────────┐  │
//! │  │  Component   │  │    Action    │   │  Store registry  │  │
//! │  │  ┌────────┐  │  │  ┌────────┐  │   │  key -> value    │  │
//! │  │  │Instance│  │  │  │Instance│  │   │     subscribers  │  │
//! │  │  │ slots  │  │  │  │ slots  │  │   └────────┬─────────┘  │
//! │  │  └────────┘  │  │  └────────┘  │            │            │
//! │  └──────┬───────┘  └──────┬───────┘            │            │
//! │         │                 │                    ▼            │
//! │         ▼                 ▼            ┌──────────────────┐ │
//! │  ┌─────────────────────────────────┐   │    Transport     │ │
//! │  │   Scheduler (microtask queue)   │   │ (other contexts) │ │
//! │  └─────────────────────────────────┘   └──────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Instances and slots
//!
//! An **instance** is the persistent identity behind repeated calls of one
//! function. Each hook call claims the next **slot**; slots are matched by
//! position, so hooks must be called in the same order every time.
//!
//! ## Effects
//!
//! Effects run after an invocation. **Deferred** effects run on the next
//! tick, batched per instance; **sync** effects run before the invocation
//! returns. A dependency list decides whether an effect reruns, and a
//! returned [`Cleanup`] runs before the rerun and on unhook.
//!
//! ## Stores and actions
//!
//! A **store** is a named JSON value shared by every instance that asks
//! for its key. An **action** is a named function with its own
//! non-reactive instance, callable from anywhere.
//!
//! ## Ticks
//!
//! Nothing runs in the background. [`Runtime::tick`] and
//! [`Runtime::run_until_idle`] drive queued microtasks, local futures and
//! inbound broadcasts.
//!
//! # Example
//!
//! ```rust
//! use hookwire::{Cleanup, Runtime};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let runtime = Runtime::with_defaults();
//! runtime.create_store("greeting", "hello".to_string()).unwrap();
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&log);
//! let component = runtime.enhook(move |hooks, ()| {
//!     let (greeting, _store) = hooks.use_store::<String>("greeting")?;
//!     let sink = Rc::clone(&sink);
//!     hooks.use_effect_with(greeting.clone(), move || {
//!         sink.borrow_mut().push(greeting);
//!         Cleanup::new(|| {})
//!     })?;
//!     Ok(())
//! });
//!
//! component.call(()).unwrap();
//! runtime.store::<String>("greeting").set("bye".into()).unwrap();
//! runtime.run_until_idle().unwrap();
//!
//! assert_eq!(*log.borrow(), vec!["hello".to_string(), "bye".to_string()]);
//! ```

// Modules
pub mod action;
pub mod broadcast;
pub mod component;
pub mod config;
pub mod deps;
pub mod effect;
pub mod error;
pub mod hooks;
pub mod instance;
pub mod runtime;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use action::Action;
pub use broadcast::{BroadcastHub, HubTransport, Origin, RemoteHandler, Transport};
pub use component::Component;
pub use config::{ConfigError, HooksConfig};
pub use deps::{compare, did_change, ByRef, Change};
pub use effect::{Cleanup, Detached, EffectOutput, EffectTiming};
pub use error::{HookError, HookResult};
pub use hooks::Hooks;
pub use instance::{Instance, InstancePhase, SlotKind};
pub use runtime::{Runtime, RuntimeStats};
pub use scheduler::{yield_now, Scheduler, YieldNow};
pub use state::Setter;
pub use store::{Store, StoreRegistry};
pub use types::{EndpointId, InstanceId, SubscriptionId};
