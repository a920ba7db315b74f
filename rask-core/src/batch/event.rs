//! Event-Scoped Batching
//!
//! Installing batching on an element makes every event dispatch whose
//! bubbling path reaches it run as one synchronous batch. Three writes in a
//! click handler then produce one re-render, not three.

use tracing::debug;

use crate::dom::Element;

/// Batch every event dispatched at `root` or any of its descendants.
pub fn install_event_batching(root: &Element) {
    root.set_event_batching(true);
    debug!(tag = root.tag(), "event batching installed");
}

/// Undo [`install_event_batching`].
pub fn uninstall_event_batching(root: &Element) {
    root.set_event_batching(false);
    debug!(tag = root.tag(), "event batching removed");
}
