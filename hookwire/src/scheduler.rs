//! Microtask scheduling
//!
//! The runtime is single threaded and cooperative. Work that must happen
//! "after the current call stack unwinds" (deferred effects, re-invocations)
//! is queued as a microtask; fire-and-forget futures (async effect and
//! action bodies) run on a local pool that is driven at the end of every
//! tick.
//!
//! A tick runs exactly the tasks that were queued when it started. Tasks
//! queued while it runs wait for the next tick, which keeps a task that
//! re-queues itself from starving everything else.

use crate::effect::Cleanup;
use crate::error::{HookError, HookResult};
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

/// A unit of deferred work
pub type Microtask = Box<dyn FnOnce()>;

struct SchedulerInner {
    queue: RefCell<VecDeque<Microtask>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    unhandled: RefCell<Vec<HookError>>,
    ticks: Cell<u64>,
}

/// Single-threaded microtask queue plus a local future pool
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

/// Non-owning scheduler handle held by queued work
#[derive(Clone)]
pub(crate) struct WeakScheduler {
    inner: Weak<SchedulerInner>,
}

impl WeakScheduler {
    pub(crate) fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            inner: Rc::new(SchedulerInner {
                queue: RefCell::new(VecDeque::new()),
                pool: RefCell::new(pool),
                spawner,
                unhandled: RefCell::new(Vec::new()),
                ticks: Cell::new(0),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Queue a microtask for the next tick
    pub fn queue(&self, task: impl FnOnce() + 'static) {
        self.inner.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Queue a microtask that can be cancelled before it runs
    ///
    /// Running the returned cleanup turns the task into a no-op.
    pub fn queue_cancellable(&self, task: impl FnOnce() + 'static) -> Cleanup {
        let cancelled = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancelled);
        self.queue(move || {
            if !flag.get() {
                task();
            }
        });
        Cleanup::new(move || cancelled.set(true))
    }

    /// Spawn a fire-and-forget future
    ///
    /// The future is polled on the local pool during ticks. A failure is not
    /// returned to anybody; it lands on the unhandled channel.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = HookResult<()>> + 'static,
    {
        let weak = self.downgrade();
        let spawned = self.inner.spawner.spawn_local(async move {
            if let Err(err) = future.await {
                if let Some(scheduler) = weak.upgrade() {
                    scheduler.report(err);
                }
            }
        });
        if let Err(err) = spawned {
            self.report(HookError::AsyncRejection(format!("spawn failed: {}", err)));
        }
    }

    /// Run one tick: the queued microtasks, then the local pool until stalled
    ///
    /// Returns the number of microtasks executed.
    pub fn tick(&self) -> usize {
        let batch: Vec<Microtask> = self.inner.queue.borrow_mut().drain(..).collect();
        let count = batch.len();
        for task in batch {
            task();
        }

        match self.inner.pool.try_borrow_mut() {
            Ok(mut pool) => pool.run_until_stalled(),
            Err(_) => tracing::trace!("local pool already running, skipping nested drive"),
        }

        self.inner.ticks.set(self.inner.ticks.get() + 1);
        tracing::trace!(tasks = count, tick = self.inner.ticks.get(), "tick");
        count
    }

    /// Number of microtasks waiting for the next tick
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Whether no microtask is waiting
    pub fn is_idle(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    /// Number of ticks run so far
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.get()
    }

    /// Push an error onto the unhandled channel
    pub fn report(&self, err: HookError) {
        tracing::error!(error = %err, "unhandled hook error");
        self.inner.unhandled.borrow_mut().push(err);
    }

    /// Drain the unhandled channel
    pub fn take_unhandled(&self) -> Vec<HookError> {
        std::mem::take(&mut *self.inner.unhandled.borrow_mut())
    }

    /// Drop every queued microtask without running it
    pub fn clear(&self) {
        self.inner.queue.borrow_mut().clear();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Yield once to the local pool
///
/// The returned future is pending on its first poll and immediately wakes
/// itself, so the pool polls it again within the same tick.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`]
#[derive(Debug)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
