//! Components
//!
//! A component is a factory that runs once and returns a render function.
//! The render function runs inside an observer's tracking frame, so the
//! component re-renders whenever reactive state it read changes, at most
//! once per batch flush.
//!
//! Turning a rendered [`VNode`] tree into real updates is the job of a
//! [`Patcher`]: `patch(old, new)` receives the previous result and the new
//! tree and returns what to remember as the current tree.

mod lifecycle;
mod mount;

pub use lifecycle::{is_initializing, on_cleanup, on_mount};
pub use mount::{mount, Component, MountedComponent};

use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::dom::{Element, VNode};

/// Unique identifier for a mounted component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

/// Applies a freshly rendered tree.
///
/// Implementations must tolerate being handed the same tree twice.
pub trait Patcher {
    fn patch(&mut self, old: &VNode, new: VNode) -> VNode;
}

impl<F> Patcher for F
where
    F: FnMut(&VNode, VNode) -> VNode,
{
    fn patch(&mut self, old: &VNode, new: VNode) -> VNode {
        self(old, new)
    }
}

/// Patches by rebuilding the children of a container element.
///
/// No diffing: any change replaces the container's whole content, and an
/// unchanged tree leaves it alone.
#[derive(Debug, Clone)]
pub struct ElementPatcher {
    container: Element,
    rebuilds: usize,
}

impl ElementPatcher {
    pub fn new(container: Element) -> Self {
        Self {
            container,
            rebuilds: 0,
        }
    }

    pub fn container(&self) -> &Element {
        &self.container
    }
}

impl Patcher for ElementPatcher {
    fn patch(&mut self, old: &VNode, new: VNode) -> VNode {
        if *old == new && self.rebuilds > 0 {
            return new;
        }
        self.container.clear_children();
        for node in new.build() {
            self.container.append_child(&node);
        }
        self.rebuilds += 1;
        trace!(tag = self.container.tag(), rebuilds = self.rebuilds, "container rebuilt");
        new
    }
}
