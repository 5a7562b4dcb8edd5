//! Persistent state hooks for hookwire
//!
//! [`use_storage`] keeps a piece of instance state mirrored in a backing
//! [`Storage`]: the state starts from the stored value, and every update is
//! written back once per tick. [`use_local_storage`] additionally follows
//! changes made to the backing store by other contexts, and [`use_cookie`]
//! stores strings in a [`CookieJar`].
//!
//! # Example
//!
//! ```rust
//! use hookwire::Runtime;
//! use hookwire_storage::{use_storage, MemoryStorage, Storage};
//! use std::rc::Rc;
//!
//! let runtime = Runtime::with_defaults();
//! let storage = Rc::new(MemoryStorage::new());
//!
//! let backing = Rc::clone(&storage);
//! let counter = runtime.enhook(move |hooks, ()| {
//!     let (count, handle) = use_storage(hooks, backing.clone(), "count", 0u32)?;
//!     if count == 0 {
//!         handle.set(1)?;
//!     }
//!     Ok(count)
//! });
//!
//! counter.call(()).unwrap();
//! runtime.run_until_idle().unwrap();
//! assert_eq!(storage.get("count").unwrap(), Some(serde_json::json!(1)));
//! ```

mod cookie;
mod error;
mod file;
mod hooks;
mod memory;
mod parse;

pub use cookie::{Cookie, CookieJar};
pub use error::StorageError;
pub use file::FileStorage;
pub use hooks::{use_cookie, use_local_storage, use_storage, StorageHandle};
pub use memory::MemoryStorage;
pub use parse::parse_auto;

use hookwire::{Cleanup, Scheduler};
use serde_json::Value;
use std::rc::Rc;

/// Callback receiving a value written to storage by another context
pub type WatchHandler = Rc<dyn Fn(Value)>;

/// A key-value backing store for persistent hooks
pub trait Storage {
    /// Stored value for `key`, if any
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Text a value is kept as, for stores that only hold strings
    ///
    /// [`get`](Storage::get) may have parsed it into something else, e.g.
    /// `"02139"` into a number.
    fn text(&self, _key: &str) -> Option<String> {
        None
    }

    /// Store `value` under `key`
    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Schedule `task` for later; running the returned cleanup cancels it
    ///
    /// Writes are planned through this so several updates in one tick
    /// collapse into a single write.
    fn plan(&self, scheduler: &Scheduler, task: Box<dyn FnOnce()>) -> Cleanup {
        scheduler.queue_cancellable(task)
    }

    /// Whether two values are the same as far as this store is concerned
    fn is(&self, a: &Value, b: &Value) -> bool {
        a == b
    }

    /// Follow writes made to `key` by other contexts
    ///
    /// Stores that cannot observe outside changes return `None`.
    fn watch(&self, _key: &str, _handler: WatchHandler) -> Option<Cleanup> {
        None
    }
}
