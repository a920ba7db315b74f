//! Computed Values
//!
//! A `Computed<T>` caches a value derived from other reactive reads and
//! recomputes it only when one of them changes.
//!
//! # How Computed Values Work
//!
//! 1. The first [`get`](Computed::get) runs the computation inside the
//!    computed value's own tracking frame and caches the result.
//! 2. When any of those reads changes, the computed value is marked stale
//!    synchronously, during the signal's walk. Nothing is recomputed yet.
//! 3. Going stale notifies the computed value's own signal, so observers
//!    that read it are scheduled like observers of any other signal.
//! 4. The next `get` recomputes.
//!
//! Stale values that nobody reads are never recomputed.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::trace;

use super::context::ReactiveContext;
use super::observer::Observer;
use super::signal::Signal;

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    /// Notified when the cached value goes stale.
    signal: Signal,
    /// Tracks the computation's own reads.
    observer: Observer,
    computations: Cell<u64>,
}

impl<T> ComputedInner<T> {
    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            trace!(signal = %self.signal.id(), "computed value stale");
            self.signal.notify();
        }
    }

    fn refresh(&self) {
        if !self.dirty.get() {
            return;
        }
        // Cleared first so a dependency changing mid-computation leaves it stale.
        self.dirty.set(false);
        let value = {
            let _stale_on_panic = StaleOnPanic(&self.dirty);
            let _frame = self.observer.observe();
            (self.compute)()
        };
        *self.value.borrow_mut() = Some(value);
        self.computations.set(self.computations.get() + 1);
    }
}

/// Marks the value stale again if the computation unwinds.
struct StaleOnPanic<'a>(&'a Cell<bool>);

impl Drop for StaleOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.set(true);
        }
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.observer.dispose();
    }
}

/// A cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let items = store.field("items");
/// let count = Computed::new(move || items.len());
///
/// count.get();                // computes
/// count.get();                // cached
/// store.field("items").push(1)?;
/// count.get();                // recomputes
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: 'static> Computed<T> {
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let observer = Observer::immediate(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            });
            ComputedInner {
                compute: Box::new(compute),
                value: RefCell::new(None),
                dirty: Cell::new(true),
                signal: Signal::new(),
                observer,
                computations: Cell::new(0),
            }
        });
        Self { inner }
    }

    /// Borrow the current value, recomputing first if stale. Tracks the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track(&self.inner.signal);
        self.inner.refresh();
        let value = self.inner.value.borrow();
        match value.as_ref() {
            Some(value) => f(value),
            None => unreachable!("refresh fills the value or unwinds"),
        }
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// How many times the computation has run.
    pub fn computation_count(&self) -> u64 {
        self.inner.computations.get()
    }

    /// Number of signals read by the most recent computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.observer.subscription_count()
    }

    /// The signal observers of this value subscribe to.
    pub fn signal(&self) -> &Signal {
        &self.inner.signal
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Get the current value, recomputing first if stale. Tracks the read.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &*self.inner.value.borrow())
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}
