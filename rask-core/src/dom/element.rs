//! Elements
//!
//! A minimal DOM-like element: a tag, attributes, children with parent
//! links, and event listeners with bubbling dispatch. It is the surface
//! event-scoped batching wraps; attribute and event semantics beyond that
//! belong to the patching layer.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use crate::batch;

/// Identifies one registered listener, for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Rc<dyn Fn(&Event)>;

struct ElementInner {
    tag: String,
    attributes: RefCell<BTreeMap<String, String>>,
    text: RefCell<Option<String>>,
    children: RefCell<Vec<Element>>,
    parent: RefCell<Weak<ElementInner>>,
    listeners: RefCell<HashMap<String, Vec<(ListenerId, Handler)>>>,
    next_listener: Cell<u64>,
    event_batching: Cell<bool>,
}

/// A node in the live element tree.
///
/// Cloning an `Element` yields another handle to the same node.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl Element {
    /// Create a detached element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                tag: tag.into(),
                attributes: RefCell::new(BTreeMap::new()),
                text: RefCell::new(None),
                children: RefCell::new(Vec::new()),
                parent: RefCell::new(Weak::new()),
                listeners: RefCell::new(HashMap::new()),
                next_listener: Cell::new(0),
                event_batching: Cell::new(false),
            }),
        }
    }

    /// Create a text node (tag `#text`).
    pub fn text_node(text: impl Into<String>) -> Self {
        let element = Self::new("#text");
        *element.inner.text.borrow_mut() = Some(text.into());
        element
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn text(&self) -> Option<String> {
        self.inner.text.borrow().clone()
    }

    /// Concatenated text of this node and all descendants.
    pub fn text_content(&self) -> String {
        let mut out = self.text().unwrap_or_default();
        for child in self.children() {
            out.push_str(&child.text_content());
        }
        out
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .attributes
            .borrow_mut()
            .insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.borrow().get(name).cloned()
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.borrow_mut().remove(name)
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.inner.attributes.borrow().clone()
    }

    /// Append `child`, moving it out of its previous parent if any.
    ///
    /// Refuses (and returns false) when `child` is this element or one of
    /// its ancestors, which would close a cycle.
    pub fn append_child(&self, child: &Element) -> bool {
        if self.bubble_path().contains(child) {
            warn!(tag = self.tag(), child = child.tag(), "refusing to append an ancestor");
            return false;
        }
        if let Some(old_parent) = child.parent() {
            old_parent.remove_child(child);
        }
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
        self.inner.children.borrow_mut().push(child.clone());
        true
    }

    /// Detach `child`. Returns whether it was a child of this element.
    pub fn remove_child(&self, child: &Element) -> bool {
        let mut children = self.inner.children.borrow_mut();
        let Some(position) = children.iter().position(|c| c == child) else {
            return false;
        };
        children.remove(position);
        *child.inner.parent.borrow_mut() = Weak::new();
        true
    }

    /// Detach every child.
    pub fn clear_children(&self) {
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children {
            *child.inner.parent.borrow_mut() = Weak::new();
        }
    }

    pub fn children(&self) -> Vec<Element> {
        self.inner.children.borrow().clone()
    }

    pub fn parent(&self) -> Option<Element> {
        self.inner
            .parent
            .borrow()
            .upgrade()
            .map(|inner| Element { inner })
    }

    /// Register `handler` for events of `kind`.
    pub fn add_event_listener<F>(&self, kind: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&Event) + 'static,
    {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .entry(kind.into())
            .or_default()
            .push((id, Rc::new(handler)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_event_listener(&self, kind: &str, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let Some(handlers) = listeners.get_mut(kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(listener, _)| *listener != id);
        before != handlers.len()
    }

    pub(crate) fn set_event_batching(&self, enabled: bool) {
        self.inner.event_batching.set(enabled);
    }

    /// Whether batching was installed on this element itself.
    pub fn has_event_batching(&self) -> bool {
        self.inner.event_batching.get()
    }

    /// This element followed by its ancestors, innermost first.
    fn bubble_path(&self) -> Vec<Element> {
        let mut path = vec![self.clone()];
        let mut cursor = self.parent();
        while let Some(element) = cursor {
            cursor = element.parent();
            path.push(element);
        }
        path
    }

    fn handlers(&self, kind: &str) -> Vec<Handler> {
        self.inner
            .listeners
            .borrow()
            .get(kind)
            .map(|handlers| handlers.iter().map(|(_, h)| Rc::clone(h)).collect())
            .unwrap_or_default()
    }

    /// Dispatch an event of `kind` at this element and bubble it up.
    ///
    /// If any element on the bubbling path has event batching installed,
    /// every handler runs inside one synchronous batch. A panicking handler
    /// aborts that batch and unwinds to the caller.
    pub fn dispatch_event(&self, kind: &str) -> Event {
        let path = self.bubble_path();
        let event = Event {
            kind: kind.to_string(),
            target: self.clone(),
            current_target: RefCell::new(None),
            propagation_stopped: Cell::new(false),
        };
        let batched = path.iter().any(Element::has_event_batching);
        trace!(kind, tag = self.tag(), batched, "dispatch");

        let run = || {
            for element in &path {
                *event.current_target.borrow_mut() = Some(element.clone());
                for handler in element.handlers(kind) {
                    handler(&event);
                }
                if event.propagation_stopped.get() {
                    break;
                }
            }
        };

        if batched {
            batch::batch(run);
        } else {
            run();
        }

        *event.current_target.borrow_mut() = None;
        event
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Element {}

impl Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.inner.tag)
            .field("attributes", &*self.inner.attributes.borrow())
            .field("children", &self.inner.children.borrow().len())
            .finish()
    }
}

/// An event travelling up the element tree.
pub struct Event {
    kind: String,
    target: Element,
    current_target: RefCell<Option<Element>>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The element the event was dispatched at.
    pub fn target(&self) -> &Element {
        &self.target
    }

    /// The element whose handlers are running, during dispatch.
    pub fn current_target(&self) -> Option<Element> {
        self.current_target.borrow().clone()
    }

    /// Stop bubbling after the current element's handlers.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}
