//! Core type definitions for the hook runtime
//!
//! These are the identity types shared by instances, store subscriptions
//! and broadcast endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Instance identifier
///
/// Every component activation and every action carries one. Ids are never
/// reused within a process, so a stale id can not address a newer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

impl InstanceId {
    /// Allocate a fresh instance ID
    pub fn new() -> Self {
        Self(INSTANCE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance:{}", self.0)
    }
}

/// Subscription identifier
///
/// Returned when subscribing to a store or a broadcast channel,
/// used to later unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    /// Create a new unique subscription ID
    pub fn new() -> Self {
        Self(SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Broadcast endpoint identifier
///
/// Each execution context connected to a hub gets one; the hub uses it to
/// avoid echoing a message back to its publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId(pub u64);

static ENDPOINT_COUNTER: AtomicU64 = AtomicU64::new(1);

impl EndpointId {
    /// Create a new unique endpoint ID
    pub fn new() -> Self {
        Self(ENDPOINT_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for EndpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint:{}", self.0)
    }
}
