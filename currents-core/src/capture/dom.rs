//! Minimal element tree for click capture
//!
//! Capture only needs two things from the host's document: attribute lookup
//! and the parent link. [`Element`] is an owned chain running from the click
//! target up to the root, which is all a click handler ever walks.

use std::collections::BTreeMap;

use serde::Deserialize;

/// A node that can be walked towards the document root.
pub trait DomNode {
    fn attribute(&self, name: &str) -> Option<&str>;

    fn parent(&self) -> Option<&Self>;

    /// Nearest node, starting with `self`, that carries `attribute`.
    fn closest(&self, attribute: &str) -> Option<&Self>
    where
        Self: Sized,
    {
        let mut node = Some(self);
        while let Some(current) = node {
            if current.attribute(attribute).is_some() {
                return Some(current);
            }
            node = current.parent();
        }
        None
    }
}

/// Owned element with its ancestor chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub parent: Option<Box<Element>>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Place `self` inside `parent`.
    pub fn inside(mut self, parent: Element) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Number of ancestors above this element
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.parent.as_deref();
        while let Some(current) = node {
            depth += 1;
            node = current.parent.as_deref();
        }
        depth
    }
}

impl DomNode for Element {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn parent(&self) -> Option<&Self> {
        self.parent.as_deref()
    }
}
