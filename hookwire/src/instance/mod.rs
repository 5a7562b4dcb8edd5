//! Instance - the persistent identity behind repeated invocations
//!
//! An instance owns the ordered slot list that hooks resume from, a cursor
//! reset at the start of every invocation, and the lifecycle state used to
//! turn already-queued work into no-ops after teardown:
//! - Slots are matched to hook calls by position
//! - Deferred effects are flushed on one microtask per instance
//! - Re-invocations requested by setters are coalesced per tick

mod slot;

pub use slot::SlotKind;
pub(crate) use slot::{EffectSlot, Slot, StoreSlot};

use crate::effect::{Cleanup, EffectBody, EffectTiming};
use crate::error::{HookError, HookResult};
use crate::scheduler::Scheduler;
use crate::types::InstanceId;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Lifecycle of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePhase {
    /// Invocations and scheduled work proceed normally
    Active,
    /// Teardown in progress, cleanups are running
    Stopping,
    /// Torn down; every later invocation fails
    Stopped,
}

struct InstanceState {
    slots: Vec<Slot>,
    cursor: usize,
    phase: InstancePhase,
    rerender_pending: bool,
    flush_queued: bool,
    invocations: u64,
    rerun: Option<Rc<dyn Fn()>>,
}

/// Per-component (or per-action) hook state
pub struct Instance {
    id: InstanceId,
    label: String,
    reactive: bool,
    scheduler: Scheduler,
    state: RefCell<InstanceState>,
    weak_self: Weak<Instance>,
}

impl Instance {
    /// Create an instance whose setters request re-invocations
    pub(crate) fn reactive(label: impl Into<String>, scheduler: Scheduler) -> Rc<Self> {
        Self::build(label.into(), scheduler, true)
    }

    /// Create an instance whose setters only store values
    pub(crate) fn passive(label: impl Into<String>, scheduler: Scheduler) -> Rc<Self> {
        Self::build(label.into(), scheduler, false)
    }

    fn build(label: String, scheduler: Scheduler, reactive: bool) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Self {
            id: InstanceId::new(),
            label,
            reactive,
            scheduler,
            state: RefCell::new(InstanceState {
                slots: Vec::new(),
                cursor: 0,
                phase: InstancePhase::Active,
                rerender_pending: false,
                flush_queued: false,
                invocations: 0,
                rerun: None,
            }),
            weak_self: weak_self.clone(),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether setters on this instance request re-invocations
    pub fn is_reactive(&self) -> bool {
        self.reactive
    }

    pub fn phase(&self) -> InstancePhase {
        self.state.borrow().phase
    }

    pub fn is_active(&self) -> bool {
        self.phase() == InstancePhase::Active
    }

    /// Number of slots allocated so far
    pub fn slot_count(&self) -> usize {
        self.state.borrow().slots.len()
    }

    /// Kinds of the allocated slots, in allocation order
    pub fn slot_kinds(&self) -> Vec<SlotKind> {
        self.state.borrow().slots.iter().map(Slot::kind).collect()
    }

    /// Number of invocations started on this instance
    pub fn invocations(&self) -> u64 {
        self.state.borrow().invocations
    }

    /// Whether a re-invocation is queued
    pub fn rerender_pending(&self) -> bool {
        self.state.borrow().rerender_pending
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(crate) fn downgrade(&self) -> Weak<Instance> {
        self.weak_self.clone()
    }

    pub(crate) fn set_rerun(&self, rerun: Rc<dyn Fn()>) {
        self.state.borrow_mut().rerun = Some(rerun);
    }

    /// Start an invocation: rewind the cursor
    pub(crate) fn begin(&self) -> HookResult<()> {
        let mut state = self.state.borrow_mut();
        if state.phase != InstancePhase::Active {
            return Err(HookError::Unhooked(self.id));
        }
        state.cursor = 0;
        state.invocations += 1;
        Ok(())
    }

    /// Claim the slot at the cursor, allocating it on first use
    ///
    /// `make` runs outside of any borrow, so it may run arbitrary code.
    pub(crate) fn next_slot(
        &self,
        kind: SlotKind,
        make: impl FnOnce() -> Slot,
    ) -> HookResult<usize> {
        let (index, exists) = {
            let state = self.state.borrow();
            if state.phase != InstancePhase::Active {
                return Err(HookError::Unhooked(self.id));
            }
            let index = state.cursor;
            match state.slots.get(index) {
                Some(slot) if slot.kind() != kind => {
                    return Err(HookError::HookOrder {
                        index,
                        stored: slot.kind(),
                        requested: kind,
                    });
                }
                found => (index, found.is_some()),
            }
        };

        if !exists {
            let slot = make();
            self.state.borrow_mut().slots.push(slot);
            tracing::trace!(instance = %self.id, index, %kind, "allocated slot");
        }
        self.state.borrow_mut().cursor = index + 1;
        Ok(index)
    }

    /// Run `f` against a slot, if it still exists
    pub(crate) fn with_slot<R>(&self, index: usize, f: impl FnOnce(&mut Slot) -> R) -> Option<R> {
        self.state.borrow_mut().slots.get_mut(index).map(f)
    }

    pub(crate) fn read_state<T: Clone + 'static>(&self, index: usize) -> HookResult<T> {
        let state = self.state.borrow();
        if state.phase == InstancePhase::Stopped {
            return Err(HookError::Unhooked(self.id));
        }
        match state.slots.get(index) {
            Some(Slot::State(value)) => value
                .downcast_ref::<T>()
                .cloned()
                .ok_or(HookError::SlotType { index }),
            _ => Err(HookError::SlotType { index }),
        }
    }

    /// Replace a state value; returns whether it changed
    ///
    /// Writes after teardown are dropped.
    pub(crate) fn write_state<T: PartialEq + 'static>(
        &self,
        index: usize,
        next: T,
    ) -> HookResult<bool> {
        let mut state = self.state.borrow_mut();
        if state.phase != InstancePhase::Active {
            tracing::trace!(instance = %self.id, index, "dropping write to unhooked instance");
            return Ok(false);
        }
        match state.slots.get_mut(index) {
            Some(Slot::State(value)) => {
                let current = value
                    .downcast_mut::<T>()
                    .ok_or(HookError::SlotType { index })?;
                if *current == next {
                    return Ok(false);
                }
                *current = next;
                Ok(true)
            }
            _ => Err(HookError::SlotType { index }),
        }
    }

    /// Record an effect for this invocation
    pub(crate) fn stage_effect<D: PartialEq + 'static>(
        &self,
        index: usize,
        deps: Option<D>,
        body: EffectBody,
    ) -> HookResult<bool> {
        let mut state = self.state.borrow_mut();
        let effect: &mut EffectSlot = state
            .slots
            .get_mut(index)
            .and_then(Slot::effect_mut)
            .ok_or(HookError::SlotType { index })?;
        effect.stage(index, deps, body)
    }

    /// Finish an invocation: run sync effects, queue the deferred flush
    ///
    /// Every pending sync effect runs; the first failure is returned and
    /// later ones are reported.
    pub(crate) fn commit(&self) -> HookResult<()> {
        let result = self.run_effects(EffectTiming::Sync);
        self.queue_flush();
        result
    }

    fn queue_flush(&self) {
        let needed = {
            let mut state = self.state.borrow_mut();
            let pending = state.slots.iter().any(|slot| match slot {
                Slot::Effect(effect) => effect.has_pending(),
                _ => false,
            });
            if state.flush_queued || state.phase != InstancePhase::Active || !pending {
                false
            } else {
                state.flush_queued = true;
                true
            }
        };

        if needed {
            let weak = self.downgrade();
            self.scheduler.queue(move || {
                if let Some(instance) = weak.upgrade() {
                    instance.flush();
                }
            });
        }
    }

    fn flush(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.flush_queued = false;
            if state.phase != InstancePhase::Active {
                return;
            }
        }
        // Deferred failures are reported inside run_effects
        let _ = self.run_effects(EffectTiming::Deferred);
    }

    fn run_effects(&self, timing: EffectTiming) -> HookResult<()> {
        let kind = timing.slot_kind();
        let mut first_error = None;
        let mut index = 0;

        loop {
            let taken = {
                let mut state = self.state.borrow_mut();
                if state.phase != InstancePhase::Active || index >= state.slots.len() {
                    break;
                }
                let slot = &mut state.slots[index];
                if slot.kind() == kind {
                    slot.effect_mut()
                        .and_then(|effect| effect.pending.take().map(|body| (body, effect.cleanup.take())))
                } else {
                    None
                }
            };

            if let Some((body, cleanup)) = taken {
                if let Some(cleanup) = cleanup {
                    cleanup.run();
                }
                tracing::trace!(instance = %self.id, index, %kind, "running effect");
                match body(&self.scheduler) {
                    Ok(cleanup) => self.keep_cleanup(index, cleanup),
                    Err(err) if timing == EffectTiming::Sync && first_error.is_none() => {
                        first_error = Some(err);
                    }
                    Err(err) => {
                        tracing::warn!(instance = %self.id, index, error = %err, "effect failed");
                        self.scheduler.report(err);
                    }
                }
            }
            index += 1;
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn keep_cleanup(&self, index: usize, cleanup: Option<Cleanup>) {
        let Some(cleanup) = cleanup else { return };
        let orphan = {
            let mut state = self.state.borrow_mut();
            let active = state.phase == InstancePhase::Active;
            match state.slots.get_mut(index).and_then(Slot::effect_mut) {
                Some(effect) if active => {
                    effect.cleanup = Some(cleanup);
                    None
                }
                _ => Some(cleanup),
            }
        };
        // Torn down while the body ran
        if let Some(cleanup) = orphan {
            cleanup.run();
        }
    }

    /// Queue one re-invocation for the next tick
    ///
    /// No-op for passive instances, after teardown, and while one is
    /// already queued.
    pub(crate) fn schedule_rerender(&self) {
        let rerun = {
            let mut state = self.state.borrow_mut();
            if !self.reactive || state.phase != InstancePhase::Active || state.rerender_pending {
                return;
            }
            let Some(rerun) = state.rerun.clone() else {
                return;
            };
            state.rerender_pending = true;
            rerun
        };

        tracing::trace!(instance = %self.id, "re-invocation scheduled");
        let weak = self.downgrade();
        self.scheduler.queue(move || {
            let Some(instance) = weak.upgrade() else {
                return;
            };
            {
                let mut state = instance.state.borrow_mut();
                state.rerender_pending = false;
                if state.phase != InstancePhase::Active {
                    return;
                }
            }
            rerun();
        });
    }

    /// Tear the instance down
    ///
    /// Flips to `Stopping`, runs every slot's cleanup in slot order, then
    /// settles in `Stopped`. Idempotent.
    pub(crate) fn teardown(&self) {
        let slots = {
            let mut state = self.state.borrow_mut();
            if state.phase != InstancePhase::Active {
                return;
            }
            state.phase = InstancePhase::Stopping;
            state.rerun = None;
            std::mem::take(&mut state.slots)
        };

        tracing::debug!(instance = %self.id, label = %self.label, slots = slots.len(), "unhooking");
        for slot in slots {
            slot.teardown();
        }
        self.state.borrow_mut().phase = InstancePhase::Stopped;
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("phase", &state.phase)
            .field("slots", &state.slots.len())
            .finish()
    }
}
