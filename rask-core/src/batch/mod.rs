//! Batching
//!
//! This module coalesces observer notifications so each dependent runs at
//! most once per logical batch, however many signals changed and however
//! often.
//!
//! # Entry Points
//!
//! - [`run_sync_batch`] / [`batch`]: an explicit synchronous batch. The
//!   flush happens when the outermost batch returns normally.
//! - [`queue`]: the deferred path taken by any notification outside a
//!   synchronous batch. Everything queued during one synchronous turn is
//!   flushed together on the next host tick.
//! - [`install_event_batching`]: event dispatch below a root element runs
//!   as one synchronous batch.
//!
//! All three share one dedup rule: the pending buffer is keyed by observer
//! identity, not by signal.

mod event;
mod host;
mod scheduler;

pub use event::{install_event_batching, uninstall_event_batching};
pub use host::{pending_microtasks, queue_microtask, run_microtasks, HostKind, Task};
pub use scheduler::{batch, flush_pending, is_batching, pending_count, queue, run_sync_batch};

pub(crate) use scheduler::enqueue;
