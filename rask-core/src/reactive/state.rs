//! Typed State
//!
//! A `State<T>` is a single reactive value: a [`Signal`] paired with the data
//! it stands for. It is the typed counterpart of a one-field store and is
//! handy for local component state.
//!
//! # How State Works
//!
//! 1. Reading with [`get`](State::get) or [`with`](State::with) inside a
//!    tracking frame subscribes the current observer.
//! 2. Writing with [`set`](State::set) stores the value and notifies, but
//!    only when the new value differs from the old one.
//! 3. Observers run through the batch scheduler, so several writes in one
//!    turn still run each observer once.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::context::ReactiveContext;
use super::signal::Signal;

struct StateInner<T> {
    value: RefCell<T>,
    signal: Signal,
}

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust,ignore
/// let count = State::new(0);
///
/// let value = count.get(); // tracks
/// count.set(5);            // notifies observers of `count`
/// ```
pub struct State<T> {
    inner: Rc<StateInner<T>>,
}

impl<T: 'static> State<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(StateInner {
                value: RefCell::new(value),
                signal: Signal::new(),
            }),
        }
    }

    /// The signal behind this state.
    pub fn signal(&self) -> &Signal {
        &self.inner.signal
    }

    /// Borrow the value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track(&self.inner.signal);
        f(&self.inner.value.borrow())
    }

    /// Borrow the value without tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value and notify, whether or not it changed.
    pub fn set_always(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.inner.signal.notify();
    }
}

impl<T: Clone + 'static> State<T> {
    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: PartialEq + 'static> State<T> {
    /// Store `value`. Observers are notified only if it differs from the
    /// current value; returns whether it did.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.inner.signal.notify();
        true
    }

    /// Compute a new value from the current one and [`set`](State::set) it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.inner.value.borrow());
        self.set(next)
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("value", &*self.inner.value.borrow())
            .field("signal", &self.inner.signal.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::run_microtasks;
    use crate::reactive::Observer;
    use std::cell::Cell;

    #[test]
    fn get_and_set() {
        let state = State::new(1);
        assert_eq!(state.get(), 1);

        assert!(state.set(2));
        assert_eq!(state.get_untracked(), 2);

        state.update(|n| n * 10);
        assert_eq!(state.get(), 20);
    }

    #[test]
    fn tracked_read_subscribes_observer() {
        let state = State::new(String::from("a"));
        let runs = Rc::new(Cell::new(0));
        let observer = {
            let runs = runs.clone();
            Observer::new(move || runs.set(runs.get() + 1))
        };

        {
            let _frame = observer.observe();
            state.with(|s| s.len());
        }
        assert_eq!(state.signal().subscriber_count(), 1);

        state.set("b".into());
        state.set("c".into());
        run_microtasks();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn equal_value_is_not_a_change() {
        let state = State::new(3);
        let runs = Rc::new(Cell::new(0));
        let observer = {
            let runs = runs.clone();
            Observer::new(move || runs.set(runs.get() + 1))
        };
        {
            let _frame = observer.observe();
            state.get();
        }

        assert!(!state.set(3));
        run_microtasks();
        assert_eq!(runs.get(), 0);

        state.set_always(3);
        run_microtasks();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let state = State::new(0);
        let observer = Observer::new(|| {});
        {
            let _frame = observer.observe();
            state.get_untracked();
        }
        assert_eq!(state.signal().subscriber_count(), 0);
    }
}
