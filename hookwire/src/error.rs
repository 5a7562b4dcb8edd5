//! Error types for the hook runtime

use crate::instance::SlotKind;
use crate::types::InstanceId;
use thiserror::Error;

/// Top-level hook runtime error
#[derive(Debug, Error)]
pub enum HookError {
    /// A hook was called in a different order than on a previous invocation
    #[error("hook order changed at slot {index}: slot holds {stored}, hook requested {requested}")]
    HookOrder {
        index: usize,
        stored: SlotKind,
        requested: SlotKind,
    },

    /// A state slot was read back with a different value type
    #[error("state slot {index} holds a value of a different type")]
    SlotType { index: usize },

    /// An effect was re-registered with a different dependency type
    #[error("effect slot {index} received dependencies of a different type")]
    DependencyType { index: usize },

    /// Lookup of an action key with no registered body
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// An action was looked up with argument or return types it was not registered with
    #[error("action {0} was registered with different argument or return types")]
    ActionType(String),

    /// A component or action was invoked while it was already running
    #[error("re-entrant invocation of {0}")]
    Reentrant(String),

    /// The instance has been torn down
    #[error("{0} has been unhooked")]
    Unhooked(InstanceId),

    /// The runtime or instance behind a handle no longer exists
    #[error("{0} has been dropped")]
    Dropped(&'static str),

    /// An asynchronous effect or action body failed
    #[error("async body rejected: {0}")]
    AsyncRejection(String),

    /// A store value could not be converted to or from its typed form
    #[error("store {key}: serialization failed: {message}")]
    Serialization { key: String, message: String },

    /// A store subscriber returned an error during fan-out
    #[error("store {key}: subscriber failed: {message}")]
    Subscriber { key: String, message: String },

    /// Cross-context transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Re-entrant store updates kept cascading past the configured bound
    #[error("store {key}: update cascade exceeded {rounds} rounds")]
    CascadeLimit { key: String, rounds: usize },

    /// The microtask queue never drained
    #[error("runtime still busy after {0} rounds")]
    IdleLimit(usize),

    /// Errors raised by adapters and other collaborators
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + 'static>),
}

impl HookError {
    pub(crate) fn serialization(key: &str, err: serde_json::Error) -> Self {
        HookError::Serialization {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type using HookError
pub type HookResult<T> = std::result::Result<T, HookError>;
