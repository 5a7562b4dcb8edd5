//! Hook slots
//!
//! A slot is the persistent storage behind one hook call. Slots are
//! addressed by call order, so the kind stored at an index must never
//! change over an instance's lifetime.

use crate::deps::{compare, Change};
use crate::effect::{Cleanup, EffectBody, EffectTiming};
use crate::error::{HookError, HookResult};
use crate::types::SubscriptionId;
use std::any::Any;
use std::fmt;

/// Kind of a hook slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    State,
    Effect,
    SyncEffect,
    Action,
    Store,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::State => "state",
            SlotKind::Effect => "effect",
            SlotKind::SyncEffect => "sync effect",
            SlotKind::Action => "action",
            SlotKind::Store => "store",
        };
        f.write_str(name)
    }
}

/// Bookkeeping for one effect hook
#[derive(Default)]
pub(crate) struct EffectSlot {
    /// Dependencies of the last scheduled run
    deps: Option<Box<dyn Any>>,
    /// Whether the effect was ever scheduled
    scheduled_once: bool,
    /// Cleanup returned by the last body that ran
    pub(crate) cleanup: Option<Cleanup>,
    /// Body waiting to run
    pub(crate) pending: Option<EffectBody>,
}

impl EffectSlot {
    /// Record this invocation's dependencies and body
    ///
    /// Returns whether the body was scheduled.
    pub(crate) fn stage<D: PartialEq + 'static>(
        &mut self,
        index: usize,
        deps: Option<D>,
        body: EffectBody,
    ) -> HookResult<bool> {
        let change = if !self.scheduled_once {
            Change::FirstRun
        } else {
            match (&self.deps, &deps) {
                (Some(prev), Some(next)) => {
                    let prev = prev
                        .downcast_ref::<D>()
                        .ok_or(HookError::DependencyType { index })?;
                    compare(Some(prev), Some(next))
                }
                _ => Change::Changed,
            }
        };

        if !change.should_run() {
            return Ok(false);
        }

        self.deps = deps.map(|d| Box::new(d) as Box<dyn Any>);
        self.scheduled_once = true;
        self.pending = Some(body);
        Ok(true)
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Storage for a store subscription hook
///
/// The subscription is released when the slot is dropped, whether or not
/// the instance was unhooked.
pub(crate) struct StoreSlot {
    pub(crate) key: String,
    pub(crate) subscription: Option<(SubscriptionId, Cleanup)>,
}

impl StoreSlot {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            subscription: None,
        }
    }

    pub(crate) fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription.as_ref().map(|(id, _)| *id)
    }

    /// Drop the current subscription
    pub(crate) fn release(&mut self) {
        if let Some((_, unsubscribe)) = self.subscription.take() {
            unsubscribe.run();
        }
    }
}

impl Drop for StoreSlot {
    fn drop(&mut self) {
        self.release();
    }
}

/// One unit of per-instance persistent hook state
pub(crate) enum Slot {
    State(Box<dyn Any>),
    Effect(EffectSlot),
    SyncEffect(EffectSlot),
    Action(String),
    Store(StoreSlot),
}

impl Slot {
    pub(crate) fn kind(&self) -> SlotKind {
        match self {
            Slot::State(_) => SlotKind::State,
            Slot::Effect(_) => SlotKind::Effect,
            Slot::SyncEffect(_) => SlotKind::SyncEffect,
            Slot::Action(_) => SlotKind::Action,
            Slot::Store(_) => SlotKind::Store,
        }
    }

    pub(crate) fn effect(timing: EffectTiming) -> Slot {
        match timing {
            EffectTiming::Deferred => Slot::Effect(EffectSlot::default()),
            EffectTiming::Sync => Slot::SyncEffect(EffectSlot::default()),
        }
    }

    pub(crate) fn effect_mut(&mut self) -> Option<&mut EffectSlot> {
        match self {
            Slot::Effect(effect) | Slot::SyncEffect(effect) => Some(effect),
            _ => None,
        }
    }

    /// Release whatever the slot holds on to
    ///
    /// Effects lose their pending body and run their cleanup; store slots
    /// drop their subscription.
    pub(crate) fn teardown(self) {
        match self {
            Slot::Effect(effect) | Slot::SyncEffect(effect) => {
                if let Some(cleanup) = effect.cleanup {
                    cleanup.run();
                }
            }
            Slot::Store(mut store) => store.release(),
            Slot::State(_) | Slot::Action(_) => {}
        }
    }
}
