//! Observers
//!
//! An Observer is one reactive computation: a component render, an effect,
//! a derived value. It remembers which signals it read during its most
//! recent tracking frame and is notified when any of them changes.
//!
//! Notifications do not call the user callback directly. They are handed
//! to the batch scheduler, which deduplicates them per observer and decides
//! when the callback runs.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::signal::{Signal, SignalId};
use super::subscription::{Link, LinkList, Side, Subscription};
use crate::batch;

/// Unique identifier for an observer.
///
/// This is also the key of the batch scheduler's dedup buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Generate a new unique observer ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// How a notification reaches the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Through the batch scheduler (the normal path).
    Scheduled,
    /// Synchronously inside the signal's walk. Used by derived values, which
    /// only mark themselves stale.
    Immediate,
}

pub(crate) struct ObserverInner {
    id: ObserverId,
    delivery: Delivery,
    disposed: Cell<bool>,
    tracking: Cell<bool>,
    links: LinkList,
    /// This observer's link to each signal it depends on.
    tracked: RefCell<HashMap<SignalId, Weak<Link>>>,
    /// Dropped on dispose so a callback that captures its own observer does
    /// not keep it alive.
    callback: RefCell<Option<Rc<dyn Fn()>>>,
}

impl ObserverInner {
    pub(crate) fn id(&self) -> ObserverId {
        self.id
    }

    pub(crate) fn links(&self) -> &LinkList {
        &self.links
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Invoked by a signal during its walk.
    pub(crate) fn deliver(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        match self.delivery {
            Delivery::Scheduled => batch::enqueue(self),
            Delivery::Immediate => self.invoke(),
        }
    }

    /// Run the callback now, unless disposed.
    pub(crate) fn invoke(&self) {
        if self.disposed.get() {
            return;
        }
        let callback = self.callback.borrow().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// The still-active link to `signal`, if any.
    pub(crate) fn link_to(&self, signal: SignalId) -> Option<Rc<Link>> {
        let tracked = self.tracked.borrow();
        tracked
            .get(&signal)
            .and_then(Weak::upgrade)
            .filter(|link| link.is_active())
    }

    pub(crate) fn record_link(&self, signal: SignalId, link: &Rc<Link>) {
        self.tracked.borrow_mut().insert(signal, Rc::downgrade(link));
    }

    pub(crate) fn subscribe_signal(self: &Rc<Self>, signal: &Signal) {
        if self.disposed.get() || self.link_to(signal.id()).is_some() {
            return;
        }
        signal.subscribe(&Observer {
            inner: Rc::clone(self),
        });
    }

    fn clear_subscriptions(&self) {
        self.links.detach_all();
        self.tracked.borrow_mut().clear();
    }

    fn end_frame(&self) {
        self.tracking.set(false);
    }
}

/// A reactive computation that tracks the signals it reads.
///
/// Cloning an `Observer` yields another handle to the same computation.
///
/// # Example
///
/// ```rust,ignore
/// let store = create_store(json!({ "count": 0 }));
/// let observer = Observer::new(|| println!("count changed"));
///
/// let frame = observer.observe();
/// store.field("count").get(); // subscribes `observer`
/// frame.end();
///
/// store.field("count").set(1)?; // callback runs on the next flush
/// ```
#[derive(Clone)]
pub struct Observer {
    inner: Rc<ObserverInner>,
}

impl Observer {
    /// Create an observer whose notifications go through the batch scheduler.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_delivery(callback, Delivery::Scheduled)
    }

    /// Create an observer that is invoked synchronously during signal walks.
    pub(crate) fn immediate<F>(callback: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_delivery(callback, Delivery::Immediate)
    }

    fn with_delivery<F>(callback: F, delivery: Delivery) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            inner: Rc::new(ObserverInner {
                id: ObserverId::new(),
                delivery,
                disposed: Cell::new(false),
                tracking: Cell::new(false),
                links: LinkList::new(Side::Observer),
                tracked: RefCell::new(HashMap::new()),
                callback: RefCell::new(Some(Rc::new(callback))),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Rc<ObserverInner> {
        &self.inner
    }

    /// Get the observer's unique ID.
    pub fn id(&self) -> ObserverId {
        self.inner.id
    }

    /// Begin a tracking frame.
    ///
    /// Drops every subscription from the previous frame, then makes this
    /// observer the current one until the returned frame ends. Frames of
    /// different observers nest; opening a second frame for the same
    /// observer before the first ends is a programming error and panics.
    pub fn observe(&self) -> TrackingFrame {
        assert!(
            !self.inner.tracking.get(),
            "{} is already tracking; end its current frame before observing again",
            self.inner.id
        );

        self.inner.clear_subscriptions();
        self.inner.tracking.set(true);
        let context = ReactiveContext::enter(Rc::clone(&self.inner));
        trace!(observer = %self.inner.id, "tracking frame opened");

        TrackingFrame {
            observer: Rc::clone(&self.inner),
            context: Some(context),
        }
    }

    /// Link this observer to `signal` for the current frame.
    ///
    /// Reading the same signal twice in one frame reuses the first link.
    pub fn subscribe_signal(&self, signal: &Signal) {
        self.inner.subscribe_signal(signal);
    }

    /// Whether a tracking frame of this observer is open.
    pub fn is_tracking(&self) -> bool {
        self.inner.tracking.get()
    }

    /// Permanently detach from every signal and stop all notifications,
    /// including ones already waiting in a batch. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.clear_subscriptions();
        let callback = self.inner.callback.borrow_mut().take();
        drop(callback);
        debug!(observer = %self.inner.id, "observer disposed");
    }

    /// Check if the observer has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of signals linked during the most recent frame.
    pub fn subscription_count(&self) -> usize {
        self.inner.links.len()
    }

    /// Handles to the current subscriptions, in the order they were made.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut out = Vec::with_capacity(self.inner.links.len());
        let mut cursor = self.inner.links.head();
        while let Some(link) = cursor {
            out.push(Subscription::new(&link));
            cursor = link.next(Side::Observer);
        }
        out
    }
}

impl PartialEq for Observer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Observer {}

impl Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.inner.id)
            .field("disposed", &self.is_disposed())
            .field("tracking", &self.is_tracking())
            .field("subscription_count", &self.subscription_count())
            .finish()
    }
}

/// An open tracking frame, returned by [`Observer::observe`].
///
/// Ending the frame (explicitly or by dropping it) pops the observer off the
/// tracking stack, so the stack stays balanced even if the tracked code
/// panics.
#[must_use = "dropping the frame immediately ends tracking"]
pub struct TrackingFrame {
    observer: Rc<ObserverInner>,
    context: Option<ReactiveContext>,
}

impl TrackingFrame {
    /// End the frame now.
    pub fn end(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(context) = self.context.take() {
            drop(context);
            self.observer.end_frame();
            trace!(observer = %self.observer.id(), "tracking frame closed");
        }
    }
}

impl Drop for TrackingFrame {
    fn drop(&mut self) {
        self.close();
    }
}
