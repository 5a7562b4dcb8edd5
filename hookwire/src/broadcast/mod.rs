//! Cross-context propagation of store updates
//!
//! A [`Transport`] carries store values between runtimes that do not share
//! memory. Each store key maps to one named channel; a runtime publishes
//! every local update on the key's channel and applies whatever arrives on
//! it as a remote update, which is never published again.
//!
//! Delivery is pull-based: [`Transport::pump`] hands inbound messages to
//! their handlers, and the runtime calls it at the start of every tick.

mod hub;

pub use hub::{BroadcastHub, HubTransport};

use crate::effect::Cleanup;
use crate::error::HookResult;
use serde_json::Value;
use std::rc::Rc;

/// Callback receiving a value published by another context
pub type RemoteHandler = Rc<dyn Fn(Value)>;

/// Where a store update came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A setter in this runtime
    Local,
    /// A message received through the transport
    Remote,
}

/// A channel-based message transport
pub trait Transport {
    /// Publish a value to every other context listening on `channel`
    fn publish(&self, channel: &str, value: &Value) -> HookResult<()>;

    /// Listen on `channel`; running the returned cleanup stops listening
    fn subscribe(&self, channel: &str, handler: RemoteHandler) -> Cleanup;

    /// Drop every subscription and pending inbound message
    fn close_all(&self);

    /// Deliver pending inbound messages, returning how many were delivered
    fn pump(&self) -> usize {
        0
    }
}
