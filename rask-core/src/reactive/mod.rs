//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, observers and
//! the subscriptions between them, plus the typed values built on top.
//! These primitives are the foundation of Rask's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a notification point attached to one piece of reactive state.
//! It knows which observers depend on it and tells them when the state
//! changes. Signals hold no value themselves; stores and [`State`] pair them
//! with data.
//!
//! ## Observers
//!
//! An Observer is a computation that reads reactive state inside a tracking
//! frame. Every read subscribes it to the signal involved; the next frame
//! starts from scratch. Notifications are routed through the batch scheduler
//! so an observer runs at most once per flush.
//!
//! ## Subscriptions
//!
//! A Subscription links one signal to one observer. Either side can drop the
//! link in constant time, and it is safe to do so while a notification walk
//! is in progress.
//!
//! ## Computed values and effects
//!
//! [`Computed`] caches a derived value and goes stale synchronously when its
//! inputs change. [`Effect`] re-runs a side effect after its inputs change.
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded. Tracking uses a thread-local stack of
//! observers: when reactive state is read, the top of the stack (if any) is
//! subscribed to that state's signal.

mod computed;
mod context;
mod effect;
pub(crate) mod observer;
mod runtime;
mod signal;
mod state;
mod subscription;

pub use computed::Computed;
pub use context::{untracked, ReactiveContext};
pub use effect::Effect;
pub use observer::{Observer, ObserverId, TrackingFrame};
pub use runtime::Runtime;
pub use signal::{Signal, SignalId};
pub use state::State;
pub use subscription::Subscription;
