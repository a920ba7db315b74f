//! Virtual Nodes
//!
//! The tree a render produces. The patching layer compares two of these and
//! applies the difference to live [`Element`]s; this module only defines the
//! shape and a straightforward way to build elements from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Element;

/// One node of a rendered tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VNode {
    /// Renders nothing. Also what a failed render produces.
    #[default]
    Empty,

    Text {
        text: String,
    },

    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<VNode>,
    },

    /// Children without a wrapping element.
    Fragment {
        children: Vec<VNode>,
    },
}

impl VNode {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Self::Element {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn fragment(children: impl IntoIterator<Item = VNode>) -> Self {
        Self::Fragment {
            children: children.into_iter().collect(),
        }
    }

    /// Set an attribute. No effect on non-element nodes.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attributes, .. } = &mut self {
            attributes.insert(name.into(), value.into());
        }
        self
    }

    /// Append a child. No effect on text and empty nodes.
    pub fn with_child(mut self, child: VNode) -> Self {
        match &mut self {
            Self::Element { children, .. } | Self::Fragment { children } => children.push(child),
            Self::Text { .. } | Self::Empty => {}
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Concatenated text of the whole tree.
    pub fn text_content(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text { text } => text.clone(),
            Self::Element { children, .. } | Self::Fragment { children } => {
                children.iter().map(VNode::text_content).collect()
            }
        }
    }

    /// Build live elements for this tree. Fragments flatten into their
    /// children; `Empty` builds nothing.
    pub fn build(&self) -> Vec<Element> {
        match self {
            Self::Empty => Vec::new(),
            Self::Text { text } => vec![Element::text_node(text.clone())],
            Self::Element {
                tag,
                attributes,
                children,
            } => {
                let element = Element::new(tag.clone());
                for (name, value) in attributes {
                    element.set_attribute(name.clone(), value.clone());
                }
                for child in children.iter().flat_map(VNode::build) {
                    element.append_child(&child);
                }
                vec![element]
            }
            Self::Fragment { children } => children.iter().flat_map(VNode::build).collect(),
        }
    }
}
