//! DOM-like Tree
//!
//! Components render [`VNode`] trees; a patcher turns them into live
//! [`Element`]s. Elements also carry event listeners, which is where
//! event-scoped batching hooks in.

mod element;
mod vnode;

pub use element::{Element, Event, ListenerId};
pub use vnode::VNode;
