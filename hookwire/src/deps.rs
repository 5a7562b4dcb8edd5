//! Dependency comparison for effects
//!
//! An effect reruns when its dependency list changed since the last run.
//! Dependency lists are plain `PartialEq` values: tuples, arrays or vectors
//! compare element-wise, so a length change or any unequal position counts
//! as a change. An omitted list (`None`) always counts as changed; an empty
//! list (`()`) only changes on the first run.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// Outcome of comparing two dependency lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// No previous run recorded
    FirstRun,
    /// Dependencies differ, or were omitted
    Changed,
    /// Every dependency is equal to the previous run's
    Unchanged,
}

impl Change {
    /// Whether the effect body has to run
    pub fn should_run(self) -> bool {
        !matches!(self, Change::Unchanged)
    }
}

/// Compare the previous run's dependencies with the current ones
///
/// `prev` is `None` before the first run. `next` is `None` when the hook
/// was called without a dependency list.
pub fn compare<D: PartialEq + ?Sized>(prev: Option<&D>, next: Option<&D>) -> Change {
    match (prev, next) {
        (None, _) => Change::FirstRun,
        (Some(_), None) => Change::Changed,
        (Some(prev), Some(next)) if prev == next => Change::Unchanged,
        (Some(_), Some(_)) => Change::Changed,
    }
}

/// Shorthand for `compare(prev, next).should_run()`
pub fn did_change<D: PartialEq + ?Sized>(prev: Option<&D>, next: Option<&D>) -> bool {
    compare(prev, next).should_run()
}

/// Reference-identity dependency
///
/// Wraps an `Rc` so that two values are equal only when they point at the
/// same allocation, whatever their contents.
pub struct ByRef<T: ?Sized>(pub Rc<T>);

impl<T> ByRef<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(value))
    }
}

impl<T: ?Sized> Clone for ByRef<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for ByRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for ByRef<T> {}

impl<T: ?Sized> Deref for ByRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> From<Rc<T>> for ByRef<T> {
    fn from(rc: Rc<T>) -> Self {
        Self(rc)
    }
}

impl<T: fmt::Debug + ?Sized> fmt::Debug for ByRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByRef").field(&&*self.0).finish()
    }
}
