//! Error types.
//!
//! Each concern has its own error enum. Failures that happen while a
//! notification is delivered have no caller to return to, so they are
//! reported through [`Runtime::report`](crate::reactive::Runtime::report)
//! as a [`ReactiveError`].

use thiserror::Error;

use crate::component::ComponentId;
use crate::reactive::ObserverId;

/// A failure surfaced by the reactive core outside any caller's `Result`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// An observer callback panicked during a walk or a flush.
    #[error("{observer} panicked while handling a notification: {message}")]
    CallbackPanicked { observer: ObserverId, message: String },

    /// A component factory failed; the component renders nothing.
    #[error("component {component} failed to initialize: {message}")]
    ComponentInit { component: ComponentId, message: String },

    /// A component render failed; the component renders nothing.
    #[error("component {component} failed to render: {message}")]
    ComponentRender { component: ComponentId, message: String },

    /// An `on_mount` or `on_cleanup` callback panicked.
    #[error("{hook} hook of component {component} panicked: {message}")]
    LifecycleHook {
        component: ComponentId,
        hook: &'static str,
        message: String,
    },
}

/// Errors from reading or writing a reactive store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no value at `{path}`")]
    MissingPath { path: String },

    #[error("value at `{path}` is not an array")]
    NotAnArray { path: String },

    #[error("value at `{path}` is not an object")]
    NotAnObject { path: String },

    #[error("value at `{path}` is not a container")]
    NotAContainer { path: String },

    #[error("index {index} out of bounds for array of length {len} at `{path}`")]
    IndexOutOfBounds { path: String, index: usize, len: usize },

    #[error("value conversion failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors raised by component factories, renders and lifecycle registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("{0}")]
    Failed(String),

    #[error("`{hook}` called outside component initialization")]
    NoCurrentComponent { hook: &'static str },
}

impl ComponentError {
    /// Build a failure from any displayable message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}

impl From<StoreError> for ComponentError {
    fn from(err: StoreError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Errors from loading a scheduler configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid scheduler config: {0}")]
    Parse(#[from] serde_json::Error),
}
