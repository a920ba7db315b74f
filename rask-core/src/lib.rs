//! Rask Core
//!
//! This crate provides the core runtime for the Rask reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, observers, computed values, effects)
//! - Batched notification scheduling (synchronous, deferred, event-scoped)
//! - Reactive stores over JSON-like data
//! - Components rendering into a DOM-like tree
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Signals, observers, subscriptions and dependency tracking
//! - `batch`: The batch scheduler and the host task queue it defers to
//! - `store`: Path-level reactive wrappers around `serde_json::Value`
//! - `dom`: A minimal element tree with bubbling events, and `VNode`
//! - `component`: The render contract tying observers to patching
//! - `config`: Per-thread scheduler configuration
//!
//! Everything is single-threaded; each thread has its own tracking stack,
//! batch buffer and task queue.
//!
//! # Example
//!
//! ```rust,ignore
//! use rask_core::{create_store, mount, run_microtasks, VNode};
//! use serde_json::json;
//!
//! let store = create_store(json!({ "count": 0 }));
//!
//! let view = mount(
//!     {
//!         let count = store.field("count");
//!         move || Ok(move || Ok(VNode::text(count.get_as::<i64>()?.to_string())))
//!     },
//!     |_old: &VNode, new: VNode| new,
//! );
//!
//! store.field("count").set(1)?;
//! store.field("count").set(2)?;
//! run_microtasks();
//! // Rendered twice in total: once on mount, once for both writes.
//! ```

pub mod batch;
pub mod component;
pub mod config;
pub mod dom;
pub mod error;
pub mod reactive;
pub mod store;

pub use batch::{
    batch, flush_pending, install_event_batching, queue, run_microtasks, run_sync_batch,
    uninstall_event_batching, HostKind,
};
pub use component::{mount, on_cleanup, on_mount, Component, ComponentId, MountedComponent, Patcher};
pub use config::SchedulerConfig;
pub use dom::{Element, VNode};
pub use error::{ComponentError, ConfigError, ReactiveError, StoreError};
pub use reactive::{Computed, Effect, Observer, Runtime, Signal, State};
pub use store::{create_store, Cursor, Store};
