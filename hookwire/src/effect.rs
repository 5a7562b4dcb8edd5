//! Effect bodies, their return values and cleanups

use crate::error::HookResult;
use crate::instance::SlotKind;
use crate::scheduler::Scheduler;
use std::fmt;
use std::future::Future;

/// When an effect body runs relative to the invocation that scheduled it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectTiming {
    /// Batched onto the next microtask, coalesced per instance
    #[default]
    Deferred,
    /// Before the invocation returns to its caller
    Sync,
}

impl EffectTiming {
    pub(crate) fn slot_kind(self) -> SlotKind {
        match self {
            EffectTiming::Deferred => SlotKind::Effect,
            EffectTiming::Sync => SlotKind::SyncEffect,
        }
    }
}

/// A teardown callback returned by an effect body
///
/// Runs before the effect body reruns and when the owning instance is
/// unhooked, exactly once either way.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Consume and run the cleanup
    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup(..)")
    }
}

/// Values an effect body may return
///
/// Settling turns the value into the cleanup stored in the effect slot.
pub trait EffectOutput: 'static {
    fn settle(self, scheduler: &Scheduler) -> HookResult<Option<Cleanup>>;
}

impl EffectOutput for () {
    fn settle(self, _scheduler: &Scheduler) -> HookResult<Option<Cleanup>> {
        Ok(None)
    }
}

impl EffectOutput for Cleanup {
    fn settle(self, _scheduler: &Scheduler) -> HookResult<Option<Cleanup>> {
        Ok(Some(self))
    }
}

impl EffectOutput for Option<Cleanup> {
    fn settle(self, _scheduler: &Scheduler) -> HookResult<Option<Cleanup>> {
        Ok(self)
    }
}

impl<O: EffectOutput> EffectOutput for HookResult<O> {
    fn settle(self, scheduler: &Scheduler) -> HookResult<Option<Cleanup>> {
        self?.settle(scheduler)
    }
}

/// An asynchronous effect body
///
/// The future is spawned and never awaited by the scheduler, so it can not
/// provide a cleanup. If it fails, the error goes to the unhandled channel.
pub struct Detached<F>(F);

impl<F> Detached<F>
where
    F: Future<Output = HookResult<()>> + 'static,
{
    pub fn new(future: F) -> Self {
        Self(future)
    }
}

impl<F> EffectOutput for Detached<F>
where
    F: Future<Output = HookResult<()>> + 'static,
{
    fn settle(self, scheduler: &Scheduler) -> HookResult<Option<Cleanup>> {
        scheduler.spawn(self.0);
        Ok(None)
    }
}

/// Type-erased effect body as stored in a slot until it runs
pub(crate) type EffectBody = Box<dyn FnOnce(&Scheduler) -> HookResult<Option<Cleanup>>>;

pub(crate) fn erase<O, F>(f: F) -> EffectBody
where
    O: EffectOutput,
    F: FnOnce() -> O + 'static,
{
    Box::new(move |scheduler: &Scheduler| f().settle(scheduler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_unit_has_no_cleanup() {
        let scheduler = Scheduler::new();
        assert!(().settle(&scheduler).unwrap().is_none());
    }

    #[test]
    fn test_cleanup_runs_once() {
        let scheduler = Scheduler::new();
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);

        let cleanup = Cleanup::new(move || counter.set(counter.get() + 1))
            .settle(&scheduler)
            .unwrap()
            .unwrap();
        cleanup.run();

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_error_output_propagates() {
        let scheduler = Scheduler::new();
        let output: HookResult<()> = Err(HookError::UnknownAction("x".into()));
        assert!(matches!(
            output.settle(&scheduler),
            Err(HookError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_detached_is_spawned() {
        let scheduler = Scheduler::new();
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);

        let cleanup = Detached::new(async move {
            flag.set(true);
            Ok(())
        })
        .settle(&scheduler)
        .unwrap();

        assert!(cleanup.is_none());
        assert!(!done.get());
        scheduler.tick();
        assert!(done.get());
    }

    #[test]
    fn test_timing_slot_kinds() {
        assert_eq!(EffectTiming::default(), EffectTiming::Deferred);
        assert_eq!(EffectTiming::Deferred.slot_kind(), SlotKind::Effect);
        assert_eq!(EffectTiming::Sync.slot_kind(), SlotKind::SyncEffect);
    }
}
