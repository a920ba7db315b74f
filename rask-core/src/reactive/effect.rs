//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever the
//! reactive values it read change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately inside its own
//!    tracking frame to establish initial dependencies.
//! 2. When any dependency changes, the effect's observer is handed to the
//!    batch scheduler, so a burst of writes re-runs the effect once.
//! 3. Each run starts a fresh frame, dropping dependencies the previous run
//!    read but this one did not.
//!
//! # Differences from Computed
//!
//! - Computed values return a value; effects do not.
//! - Computed values are lazy; effects re-run on their own.

use std::cell::Cell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::trace;

use super::observer::{Observer, ObserverId};

struct EffectInner {
    run: Box<dyn Fn()>,
    observer: Observer,
    runs: Cell<usize>,
}

impl EffectInner {
    fn execute(&self) {
        if self.observer.is_disposed() {
            return;
        }
        let _frame = self.observer.observe();
        (self.run)();
        self.runs.set(self.runs.get() + 1);
        trace!(observer = %self.observer.id(), runs = self.runs.get(), "effect ran");
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        self.observer.dispose();
    }
}

/// A side-effecting computation that runs when its dependencies change.
///
/// Dropping the last handle disposes the effect.
///
/// # Example
///
/// ```rust,ignore
/// let count = State::new(0);
///
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("count is {}", count.get())
/// });
///
/// count.set(5); // prints "count is 5" on the next flush
/// ```
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create an effect and run it once now.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create an effect without running it. It has no dependencies until the
    /// first [`execute`](Effect::execute).
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<EffectInner>| {
            let weak = weak.clone();
            EffectInner {
                run: Box::new(run),
                observer: Observer::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.execute();
                    }
                }),
                runs: Cell::new(0),
            }
        });
        Self { inner }
    }

    pub fn id(&self) -> ObserverId {
        self.inner.observer.id()
    }

    /// Run the effect now, re-tracking its dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Stop the effect for good. Idempotent.
    pub fn dispose(&self) {
        self.inner.observer.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.observer.is_disposed()
    }

    /// Number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.runs.get()
    }

    /// Number of signals read during the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.observer.subscription_count()
    }
}

impl Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
