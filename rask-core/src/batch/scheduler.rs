//! Batch Scheduler
//!
//! The scheduler decides how many times, and when, an observer's callback
//! runs after its signals notify it.
//!
//! # Algorithm
//!
//! Every notification lands in one per-thread pending buffer keyed by
//! observer identity:
//!
//! 1. If the observer is already pending, nothing changes. Five signals
//!    notifying the same observer still produce one entry.
//! 2. Otherwise it is appended, so the buffer keeps the order in which each
//!    observer was first recorded.
//! 3. Outside a synchronous batch, the first entry also schedules a flush on
//!    the host task queue (the next microtask-like tick).
//! 4. A flush takes the whole buffer, leaving a fresh one for notifications
//!    raised by the callbacks themselves, and invokes each observer that is
//!    still alive and not disposed, exactly once.
//!
//! Synchronous batches suppress step 3 and flush when the outermost batch
//! exits normally. A failed batch throws away what it recorded.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use super::host;
use crate::error::ReactiveError;
use crate::reactive::observer::ObserverInner;
use crate::reactive::{Observer, ObserverId, Runtime};

thread_local! {
    static SCHEDULER: RefCell<Scheduler> = RefCell::new(Scheduler::new());
}

/// Per-thread batch state.
struct Scheduler {
    /// Open synchronous batches.
    depth: usize,

    /// Observers waiting for the next flush, in first-recorded order.
    pending: IndexMap<ObserverId, Weak<ObserverInner>>,

    /// Whether a deferred flush sits on the host task queue.
    flush_scheduled: bool,
}

impl Scheduler {
    fn new() -> Self {
        Self {
            depth: 0,
            pending: IndexMap::new(),
            flush_scheduled: false,
        }
    }
}

/// Record a notification for `observer`.
pub(crate) fn enqueue(observer: &Rc<ObserverInner>) {
    let schedule = SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        scheduler
            .pending
            .entry(observer.id())
            .or_insert_with(|| Rc::downgrade(observer));
        trace!(observer = %observer.id(), pending = scheduler.pending.len(), "queued");

        scheduler.depth == 0 && !scheduler.flush_scheduled
    });

    if schedule {
        // Set only after the host accepted the task.
        host::schedule(Box::new(flush_deferred));
        SCHEDULER.with(|scheduler| scheduler.borrow_mut().flush_scheduled = true);
    }
}

/// Queue `observer` for the next flush, as if one of its signals notified.
///
/// Inside a synchronous batch the callback runs when the batch exits;
/// otherwise on the next host tick.
pub fn queue(observer: &Observer) {
    if !observer.is_disposed() {
        enqueue(observer.inner());
    }
}

fn flush_deferred() {
    let in_batch = SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        scheduler.flush_scheduled = false;
        scheduler.depth > 0
    });

    // An open batch flushes everything when it exits.
    if !in_batch {
        flush_pending();
    }
}

/// Invoke every pending observer now, in first-recorded order.
///
/// Disposed and dropped observers are skipped. A panicking callback is
/// reported and the flush moves on. Returns the number of callbacks run.
pub fn flush_pending() -> usize {
    let pending = SCHEDULER.with(|scheduler| std::mem::take(&mut scheduler.borrow_mut().pending));
    if pending.is_empty() {
        return 0;
    }
    debug!(count = pending.len(), "flushing pending observers");

    let mut invoked = 0;
    for (id, observer) in pending {
        let Some(observer) = observer.upgrade() else {
            continue;
        };
        if observer.is_disposed() {
            continue;
        }

        invoked += 1;
        if let Err(message) = Runtime::guard(|| observer.invoke()) {
            Runtime::report(ReactiveError::CallbackPanicked {
                observer: id,
                message,
            });
        }
    }
    invoked
}

/// Whether a synchronous batch is open on this thread.
pub fn is_batching() -> bool {
    SCHEDULER.with(|scheduler| scheduler.borrow().depth > 0)
}

/// Number of observers waiting for a flush.
pub fn pending_count() -> usize {
    SCHEDULER.with(|scheduler| scheduler.borrow().pending.len())
}

/// Keeps the batch depth balanced, including when the body panics.
struct BatchGuard {
    /// Buffer length when this batch opened.
    mark: usize,
    finished: bool,
}

impl BatchGuard {
    fn enter() -> Self {
        SCHEDULER.with(|scheduler| {
            let mut scheduler = scheduler.borrow_mut();
            scheduler.depth += 1;
            trace!(depth = scheduler.depth, "batch opened");
            Self {
                mark: scheduler.pending.len(),
                finished: false,
            }
        })
    }

    fn commit(mut self) {
        self.finished = true;
        let outermost = SCHEDULER.with(|scheduler| {
            let mut scheduler = scheduler.borrow_mut();
            scheduler.depth -= 1;
            scheduler.depth == 0
        });

        if outermost {
            flush_pending();
        }
    }

    fn abort(mut self) {
        self.finished = true;
        discard(self.mark);
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if !self.finished {
            discard(self.mark);
        }
    }
}

fn discard(mark: usize) {
    SCHEDULER.with(|scheduler| {
        let mut scheduler = scheduler.borrow_mut();
        scheduler.depth -= 1;
        let dropped = scheduler.pending.len().saturating_sub(mark);
        scheduler.pending.truncate(mark);
        warn!(dropped, depth = scheduler.depth, "batch body failed; notifications discarded");
    });
}

/// Run `body` as one synchronous batch.
///
/// Every observer notified while `body` runs is invoked once, after it
/// returns `Ok`, in the order it was first notified. If `body` returns
/// `Err` (or panics), the notifications it produced are dropped and the
/// error propagates; writes it already made stay in place. Nested batches
/// fold into the outermost one, which alone flushes.
///
/// # Example
///
/// ```rust,ignore
/// run_sync_batch(|| {
///     count.set(1)?;
///     count.set(2)?;
///     Ok::<_, StoreError>(())
/// })?;
/// // observers of `count` ran once and saw 2
/// ```
pub fn run_sync_batch<T, E, F>(body: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let guard = BatchGuard::enter();
    match body() {
        Ok(value) => {
            guard.commit();
            Ok(value)
        }
        Err(err) => {
            guard.abort();
            Err(err)
        }
    }
}

/// [`run_sync_batch`] for bodies that cannot fail.
pub fn batch<T, F>(body: F) -> T
where
    F: FnOnce() -> T,
{
    match run_sync_batch(|| Ok::<T, Infallible>(body())) {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{run_microtasks, HostKind};
    use crate::config::SchedulerConfig;
    use crate::reactive::Signal;
    use std::cell::Cell;

    fn counting(runs: &Rc<Cell<usize>>) -> Observer {
        let runs = runs.clone();
        Observer::new(move || runs.set(runs.get() + 1))
    }

    #[test]
    fn notifications_from_many_signals_collapse() {
        let runs = Rc::new(Cell::new(0));
        let observer = counting(&runs);
        let signals: Vec<Signal> = (0..5).map(|_| Signal::new()).collect();
        for signal in &signals {
            signal.subscribe(&observer);
        }

        batch(|| {
            for signal in &signals {
                signal.notify();
                signal.notify();
            }
            assert_eq!(pending_count(), 1);
            assert_eq!(runs.get(), 0);
        });

        assert_eq!(runs.get(), 1);
        assert_eq!(pending_count(), 0);
    }

    #[test]
    fn flush_runs_in_first_recorded_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let make = |name: &'static str| {
            let log = log.clone();
            Observer::new(move || log.borrow_mut().push(name))
        };
        let a = make("a");
        let b = make("b");
        let c = make("c");

        batch(|| {
            queue(&b);
            queue(&a);
            queue(&b);
            queue(&c);
            queue(&a);
        });

        assert_eq!(*log.borrow(), vec!["b", "a", "c"]);
    }

    #[test]
    fn nested_batches_flush_once_at_outermost_exit() {
        let runs = Rc::new(Cell::new(0));
        let observer = counting(&runs);

        batch(|| {
            batch(|| queue(&observer));
            assert_eq!(runs.get(), 0);
            assert!(is_batching());
            queue(&observer);
        });

        assert!(!is_batching());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn failed_batch_discards_its_notifications() {
        let runs = Rc::new(Cell::new(0));
        let observer = counting(&runs);

        let result: Result<(), &str> = run_sync_batch(|| {
            queue(&observer);
            Err("body failed")
        });

        assert_eq!(result, Err("body failed"));
        assert_eq!(pending_count(), 0);
        assert!(!is_batching());
        run_microtasks();
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn panicking_batch_discards_and_unwinds() {
        let runs = Rc::new(Cell::new(0));
        let observer = counting(&runs);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            batch(|| {
                queue(&observer);
                panic!("body panicked");
            })
        }));

        assert!(result.is_err());
        assert!(!is_batching());
        assert_eq!(pending_count(), 0);
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn failed_batch_keeps_earlier_deferred_entries() {
        let runs = Rc::new(Cell::new(0));
        let earlier = counting(&runs);
        let inside = counting(&runs);

        queue(&earlier);
        let _ = run_sync_batch(|| {
            queue(&inside);
            Err::<(), _>("nope")
        });
        assert_eq!(pending_count(), 1);

        run_microtasks();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn deferred_queue_flushes_on_next_tick() {
        let runs = Rc::new(Cell::new(0));
        let observer = counting(&runs);

        queue(&observer);
        queue(&observer);
        assert_eq!(runs.get(), 0);

        run_microtasks();
        assert_eq!(runs.get(), 1);

        queue(&observer);
        run_microtasks();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn disposal_after_recording_cancels_callback() {
        let runs = Rc::new(Cell::new(0));
        let observer = counting(&runs);

        batch(|| {
            queue(&observer);
            observer.dispose();
        });

        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn one_observer_disposing_another_mid_flush() {
        let runs = Rc::new(Cell::new(0));
        let victim = counting(&runs);
        let killer = {
            let victim = victim.clone();
            Observer::new(move || victim.dispose())
        };

        batch(|| {
            queue(&killer);
            queue(&victim);
        });

        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn callbacks_that_notify_get_a_fresh_flush() {
        let runs = Rc::new(Cell::new(0));
        let downstream = counting(&runs);
        let upstream = {
            let downstream = downstream.clone();
            Observer::new(move || queue(&downstream))
        };

        batch(|| queue(&upstream));
        assert_eq!(runs.get(), 0);
        assert_eq!(pending_count(), 1);

        run_microtasks();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn panicking_callback_does_not_block_siblings() {
        let failures = Rc::new(Cell::new(0));
        {
            let failures = failures.clone();
            Runtime::set_error_handler(move |_| failures.set(failures.get() + 1));
        }
        let runs = Rc::new(Cell::new(0));
        let bad = Observer::new(|| panic!("render blew up"));
        let good = counting(&runs);

        batch(|| {
            queue(&bad);
            queue(&good);
        });
        Runtime::clear_error_handler();

        assert_eq!(runs.get(), 1);
        assert_eq!(failures.get(), 1);
    }

    #[test]
    fn failed_inner_batch_keeps_outer_entries() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let make = |name: &'static str| {
            let log = log.clone();
            Observer::new(move || log.borrow_mut().push(name))
        };
        let before = make("before");
        let inner = make("inner");
        let after = make("after");

        batch(|| {
            queue(&before);
            let result = run_sync_batch(|| {
                queue(&inner);
                queue(&before);
                Err::<(), _>("inner failed")
            });
            assert!(result.is_err());
            assert!(is_batching());
            assert_eq!(pending_count(), 1);
            queue(&after);
            assert!(log.borrow().is_empty());
        });

        assert_eq!(*log.borrow(), vec!["before", "after"]);
        run_microtasks();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn host_failure_does_not_wedge_deferred_flushes() {
        let runs = Rc::new(Cell::new(0));
        let observer = counting(&runs);

        Runtime::configure(SchedulerConfig::default().with_host(HostKind::Tokio));
        // No LocalSet on this thread, so spawning the flush panics.
        let scheduled = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| queue(&observer)));
        Runtime::configure(SchedulerConfig::default());
        assert!(scheduled.is_err());
        assert_eq!(pending_count(), 1);

        queue(&observer);
        run_microtasks();
        assert_eq!(runs.get(), 1);
        assert_eq!(pending_count(), 0);

        queue(&observer);
        run_microtasks();
        assert_eq!(runs.get(), 2);
    }
}
