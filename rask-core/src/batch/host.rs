//! Host Task Queue
//!
//! Deferred flushes need "run this after the currently executing
//! synchronous code, before anything else observable happens". The host
//! provides that tick.
//!
//! - [`HostKind::Microtask`]: a per-thread FIFO queue. The embedding event
//!   loop (or a test) drains it with [`run_microtasks`] once its current
//!   synchronous turn is over.
//! - [`HostKind::Tokio`]: each task is spawned with
//!   `tokio::task::spawn_local`, so it runs the next time the surrounding
//!   `LocalSet` gets to poll. Scheduling a flush outside a `LocalSet`
//!   panics.

use std::cell::RefCell;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::reactive::Runtime;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Which task queue deferred flushes go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostKind {
    /// The built-in per-thread microtask queue.
    #[default]
    Microtask,
    /// The current tokio `LocalSet`.
    Tokio,
}

thread_local! {
    static MICROTASKS: RefCell<VecDeque<Task>> = const { RefCell::new(VecDeque::new()) };
}

/// Schedule `task` on the configured host.
pub(crate) fn schedule(task: Task) {
    match Runtime::config().host {
        HostKind::Microtask => {
            MICROTASKS.with(|queue| queue.borrow_mut().push_back(task));
        }
        HostKind::Tokio => {
            tokio::task::spawn_local(async move { task() });
        }
    }
}

/// Schedule a zero-delay callback on the configured host.
pub fn queue_microtask<F>(f: F)
where
    F: FnOnce() + 'static,
{
    schedule(Box::new(f));
}

/// Drain the microtask queue, including tasks queued while draining.
///
/// Returns the number of tasks run.
pub fn run_microtasks() -> usize {
    let mut ran = 0;
    loop {
        let task = MICROTASKS.with(|queue| queue.borrow_mut().pop_front());
        let Some(task) = task else {
            break;
        };
        task();
        ran += 1;
    }
    if ran > 0 {
        trace!(ran, "microtasks drained");
    }
    ran
}

/// Number of tasks waiting in the microtask queue.
pub fn pending_microtasks() -> usize {
    MICROTASKS.with(|queue| queue.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn microtasks_run_in_fifo_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let log = log.clone();
            queue_microtask(move || log.borrow_mut().push(n));
        }

        assert_eq!(pending_microtasks(), 3);
        assert!(log.borrow().is_empty());

        assert_eq!(run_microtasks(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn tasks_queued_while_draining_run_in_same_drain() {
        let hits = Rc::new(Cell::new(0));
        {
            let hits = hits.clone();
            queue_microtask(move || {
                hits.set(hits.get() + 1);
                let hits = hits.clone();
                queue_microtask(move || hits.set(hits.get() + 10));
            });
        }

        assert_eq!(run_microtasks(), 2);
        assert_eq!(hits.get(), 11);
        assert_eq!(pending_microtasks(), 0);
    }
}
