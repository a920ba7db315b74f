//! Reactive Context
//!
//! The reactive context tracks which observer is currently running. This
//! enables automatic dependency tracking: when reactive state is read, the
//! current observer is subscribed to that state's signal.
//!
//! # Implementation
//!
//! We use a thread-local stack of observers. Opening a tracking frame pushes
//! the observer; ending it pops. Only the top entry is visible to reads, so
//! nested frames (a render reading a derived value that recomputes) each
//! collect their own dependencies.
//!
//! An `untracked` section pushes an empty entry, hiding every observer below
//! it until the section ends.

use std::cell::RefCell;
use std::rc::Rc;

use super::observer::{ObserverInner, ObserverId};
use super::signal::Signal;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Clone)]
struct ContextEntry {
    /// `None` marks an untracked section.
    observer: Option<Rc<ObserverInner>>,
}

impl ContextEntry {
    fn id(&self) -> Option<ObserverId> {
        self.observer.as_ref().map(|o| o.id())
    }
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if the
/// tracked computation panics.
pub struct ReactiveContext {
    entry: Option<ObserverId>,
}

impl ReactiveContext {
    /// Push `observer` as the current observer.
    pub(crate) fn enter(observer: Rc<ObserverInner>) -> Self {
        Self::push(ContextEntry {
            observer: Some(observer),
        })
    }

    /// Push an untracked section.
    pub(crate) fn enter_untracked() -> Self {
        Self::push(ContextEntry { observer: None })
    }

    fn push(entry: ContextEntry) -> Self {
        let id = entry.id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry));
        Self { entry: id }
    }

    /// The observer at the top of the stack, if tracking is active.
    pub(crate) fn current() -> Option<Rc<ObserverInner>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|e| e.observer.clone()))
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().last().is_some_and(|e| e.observer.is_some()))
    }

    /// Get the current observer ID, if any.
    pub fn current_observer() -> Option<ObserverId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(ContextEntry::id))
    }

    /// Depth of the stack, untracked sections included.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Record a dependency of the current observer on `signal`.
    ///
    /// This is called by reactive state when it is read. Outside a tracking
    /// frame it does nothing.
    pub fn track(signal: &Signal) {
        if let Some(observer) = Self::current() {
            observer.subscribe_signal(signal);
        }
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.id(),
                    self.entry,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.entry,
                    entry.id()
                );
            }
        });
    }
}

/// Run `f` without tracking any reads it makes.
///
/// # Example
///
/// ```rust,ignore
/// let frame = observer.observe();
/// let label = untracked(|| store.field("label").get());
/// frame.end(); // `observer` does not depend on `label`
/// ```
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _context = ReactiveContext::enter_untracked();
    f()
}
