//! Subscriptions
//!
//! A subscription is the single link between one signal and one observer.
//! Each link is a node in two intrusive doubly linked lists at once: the
//! signal's list of subscribers and the observer's list of dependencies.
//! Either side can detach a link in O(1) without scanning.
//!
//! # Ownership
//!
//! - Forward pointers (`next`) are strong, backward pointers (`prev`) weak.
//! - A link refers back to its signal and observer weakly, so a link never
//!   keeps either side alive.
//! - Unlinking leaves the node's own forward pointers in place. A notify walk
//!   that cached a node removed in the meantime can still continue through it
//!   to whatever followed it.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::observer::ObserverInner;
use super::signal::SignalInner;

/// Which of the two membership lists an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Signal,
    Observer,
}

/// A node shared by a signal's list and an observer's list.
pub(crate) struct Link {
    signal: Weak<SignalInner>,
    observer: Weak<ObserverInner>,
    created_at_epoch: u64,
    in_signal: Cell<bool>,
    in_observer: Cell<bool>,
    next_in_signal: RefCell<Option<Rc<Link>>>,
    prev_in_signal: RefCell<Weak<Link>>,
    next_in_observer: RefCell<Option<Rc<Link>>>,
    prev_in_observer: RefCell<Weak<Link>>,
}

impl Link {
    pub(crate) fn new(
        signal: Weak<SignalInner>,
        observer: Weak<ObserverInner>,
        created_at_epoch: u64,
    ) -> Rc<Self> {
        Rc::new(Self {
            signal,
            observer,
            created_at_epoch,
            in_signal: Cell::new(false),
            in_observer: Cell::new(false),
            next_in_signal: RefCell::new(None),
            prev_in_signal: RefCell::new(Weak::new()),
            next_in_observer: RefCell::new(None),
            prev_in_observer: RefCell::new(Weak::new()),
        })
    }

    /// The signal epoch this link was created at; the notify barrier.
    pub(crate) fn created_at_epoch(&self) -> u64 {
        self.created_at_epoch
    }

    /// A link is active while both sides still hold it.
    pub(crate) fn is_active(&self) -> bool {
        self.in_signal.get() && self.in_observer.get()
    }

    pub(crate) fn observer(&self) -> Option<Rc<ObserverInner>> {
        self.observer.upgrade()
    }

    pub(crate) fn next(&self, side: Side) -> Option<Rc<Link>> {
        self.next_cell(side).borrow().clone()
    }

    fn next_cell(&self, side: Side) -> &RefCell<Option<Rc<Link>>> {
        match side {
            Side::Signal => &self.next_in_signal,
            Side::Observer => &self.next_in_observer,
        }
    }

    fn prev_cell(&self, side: Side) -> &RefCell<Weak<Link>> {
        match side {
            Side::Signal => &self.prev_in_signal,
            Side::Observer => &self.prev_in_observer,
        }
    }

    fn membership(&self, side: Side) -> &Cell<bool> {
        match side {
            Side::Signal => &self.in_signal,
            Side::Observer => &self.in_observer,
        }
    }

    /// Detach this link from both lists.
    ///
    /// Idempotent: a side that no longer holds the link is skipped, as is a
    /// side that is being dropped (its list detaches its own links).
    pub(crate) fn detach(self: &Rc<Self>) {
        if let Some(signal) = self.signal.upgrade() {
            signal.links().unlink(self, Side::Signal);
        }
        if let Some(observer) = self.observer.upgrade() {
            observer.links().unlink(self, Side::Observer);
        }
    }
}

/// One side's list of links: a signal's subscribers or an observer's
/// dependencies.
pub(crate) struct LinkList {
    side: Side,
    head: RefCell<Option<Rc<Link>>>,
    tail: RefCell<Weak<Link>>,
    len: Cell<usize>,
}

impl LinkList {
    pub(crate) fn new(side: Side) -> Self {
        Self {
            side,
            head: RefCell::new(None),
            tail: RefCell::new(Weak::new()),
            len: Cell::new(0),
        }
    }

    pub(crate) fn head(&self) -> Option<Rc<Link>> {
        self.head.borrow().clone()
    }

    pub(crate) fn tail(&self) -> Option<Rc<Link>> {
        self.tail.borrow().upgrade()
    }

    pub(crate) fn len(&self) -> usize {
        self.len.get()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    /// Append a link at the tail.
    pub(crate) fn push_back(&self, link: &Rc<Link>) {
        let side = self.side;
        debug_assert!(!link.membership(side).get(), "link appended twice");

        match self.tail() {
            Some(tail) => {
                *tail.next_cell(side).borrow_mut() = Some(Rc::clone(link));
                *link.prev_cell(side).borrow_mut() = Rc::downgrade(&tail);
            }
            None => {
                *self.head.borrow_mut() = Some(Rc::clone(link));
            }
        }
        *self.tail.borrow_mut() = Rc::downgrade(link);
        link.membership(side).set(true);
        self.len.set(self.len.get() + 1);
    }

    /// Remove a link in O(1) using its own neighbour pointers.
    pub(crate) fn unlink(&self, link: &Rc<Link>, side: Side) {
        debug_assert_eq!(side, self.side);
        if !link.membership(side).replace(false) {
            return;
        }

        let prev = link.prev_cell(side).borrow().upgrade();
        let next = link.next(side);

        match &prev {
            Some(prev) => *prev.next_cell(side).borrow_mut() = next.clone(),
            None => *self.head.borrow_mut() = next.clone(),
        }
        match &next {
            Some(next) => {
                *next.prev_cell(side).borrow_mut() =
                    prev.as_ref().map(Rc::downgrade).unwrap_or_default();
            }
            None => {
                *self.tail.borrow_mut() = prev.as_ref().map(Rc::downgrade).unwrap_or_default();
            }
        }

        *link.prev_cell(side).borrow_mut() = Weak::new();
        self.len.set(self.len.get() - 1);
    }

    /// Detach every link in this list from both of its lists.
    ///
    /// Runs front to back without recursion, so dropping a long list cannot
    /// overflow the stack.
    pub(crate) fn detach_all(&self) {
        while let Some(link) = self.head() {
            // Own side first: the owner may be mid-drop and unreachable
            // through the link's weak back reference.
            self.unlink(&link, self.side);
            link.detach();
        }
    }
}

impl Drop for LinkList {
    fn drop(&mut self) {
        self.detach_all();
    }
}

/// Handle to one subscription, returned by [`Signal::subscribe`].
///
/// Holding the handle does not keep the subscription alive: it ends when
/// either the signal or the observer drops it.
///
/// [`Signal::subscribe`]: super::Signal::subscribe
#[derive(Clone)]
pub struct Subscription {
    link: Weak<Link>,
}

impl Subscription {
    pub(crate) fn new(link: &Rc<Link>) -> Self {
        Self {
            link: Rc::downgrade(link),
        }
    }

    /// Whether both the signal and the observer still hold this link.
    pub fn is_active(&self) -> bool {
        self.link.upgrade().is_some_and(|link| link.is_active())
    }

    /// The signal epoch this subscription was created at.
    pub fn created_at_epoch(&self) -> Option<u64> {
        self.link.upgrade().map(|link| link.created_at_epoch())
    }

    /// Detach from both sides. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(link) = self.link.upgrade() {
            link.detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .field("created_at_epoch", &self.created_at_epoch())
            .finish()
    }
}
