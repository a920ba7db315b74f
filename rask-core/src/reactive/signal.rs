//! Signal Implementation
//!
//! A Signal is the fundamental notification point. It holds no value of its
//! own; it only knows which observers currently depend on it and how to tell
//! them that something changed.
//!
//! # How Signals Work
//!
//! 1. When an observer reads reactive state during a tracking frame, the
//!    state's signal gains a subscription for that observer.
//!
//! 2. When the state changes, the signal walks its subscriptions once and
//!    delivers a notification to each observer.
//!
//! 3. Observers hand the notification to the batch scheduler, which decides
//!    when their callbacks actually run.
//!
//! # The Epoch Barrier
//!
//! Each signal carries an epoch counter. A subscription records
//! `epoch + 1` when it is created; `notify` bumps the epoch and only
//! delivers to subscriptions created at or before the new value. Anything
//! subscribed while the walk is in progress waits for the next notify, so a
//! read-then-notify cycle inside one walk cannot fire twice or forever.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The epoch counter (8 bytes)
//! - The head/tail of its subscription list (no per-notify allocation)

use std::cell::Cell;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::observer::Observer;
use super::runtime::Runtime;
use super::subscription::{Link, LinkList, Side, Subscription};
use crate::error::ReactiveError;

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    /// Generate a new unique signal ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal#{}", self.0)
    }
}

pub(crate) struct SignalInner {
    id: SignalId,
    epoch: Cell<u64>,
    links: LinkList,
}

impl SignalInner {
    pub(crate) fn links(&self) -> &LinkList {
        &self.links
    }
}

/// An observable notification point.
///
/// Cloning a `Signal` yields another handle to the same subscriber list.
///
/// # Example
///
/// ```rust,ignore
/// let signal = Signal::new();
/// let observer = Observer::new(|| println!("changed"));
///
/// signal.subscribe(&observer);
/// signal.notify(); // queues the observer with the batch scheduler
/// ```
#[derive(Clone)]
pub struct Signal {
    inner: Rc<SignalInner>,
}

impl Signal {
    /// Create a signal with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: SignalId::new(),
                epoch: Cell::new(0),
                links: LinkList::new(Side::Signal),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Current epoch. Advances by one on every notify that has subscribers.
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.get()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.links.len()
    }

    /// Whether any observer currently depends on this signal.
    pub fn has_subscribers(&self) -> bool {
        !self.inner.links.is_empty()
    }

    /// Append a subscription for `observer`. O(1).
    ///
    /// An observer that is already subscribed gets its existing subscription
    /// back. A disposed observer gets an inert subscription that is never
    /// linked.
    pub fn subscribe(&self, observer: &Observer) -> Subscription {
        let observer_inner = observer.inner();
        if let Some(link) = observer_inner.link_to(self.inner.id) {
            return Subscription::new(&link);
        }
        let link = Link::new(
            Rc::downgrade(&self.inner),
            Rc::downgrade(observer_inner),
            self.inner.epoch.get() + 1,
        );

        if !observer_inner.is_disposed() {
            self.inner.links.push_back(&link);
            observer_inner.links().push_back(&link);
            observer_inner.record_link(self.inner.id, &link);
            trace!(signal = %self.inner.id, observer = %observer.id(), "subscribed");
        }

        Subscription::new(&link)
    }

    /// Remove a subscription in O(1). Idempotent.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        subscription.unsubscribe();
    }

    /// Notify every subscription that existed before this call.
    ///
    /// The walk caches each node's successor before delivering, so observers
    /// may unsubscribe themselves (or anything else) while it runs. A
    /// delivery that panics is isolated: the walk finishes and the failure
    /// goes to the runtime's error handler.
    pub fn notify(&self) {
        let Some(mut cursor) = self.inner.links.head() else {
            return;
        };

        let barrier = self.inner.epoch.get() + 1;
        self.inner.epoch.set(barrier);
        trace!(signal = %self.inner.id, barrier, "notify");

        loop {
            let next = cursor.next(Side::Signal);

            if cursor.is_active() && cursor.created_at_epoch() <= barrier {
                if let Some(observer) = cursor.observer() {
                    if let Err(message) = Runtime::guard(|| observer.deliver()) {
                        Runtime::report(ReactiveError::CallbackPanicked {
                            observer: observer.id(),
                            message,
                        });
                    }
                }
            }

            match next {
                Some(next) => cursor = next,
                None => break,
            }
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Signal {}

impl Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("epoch", &self.epoch())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
