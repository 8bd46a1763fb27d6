/// DOM access used by cache restoration
pub mod memory;
pub mod web;

use std::fmt;

use crate::error::CacheError;
use crate::markup::{TAB_ID_ATTR, TAB_ID_PREFIX, WINDOW_ID_PREFIX, parse_prefixed_id};
use crate::tab_data::{TabId, WindowId};

/// Id of the element that holds every window container
pub const TABBAR_ID: &str = "tabbar";

pub fn tab_dom_id(tab_id: TabId) -> String {
    format!("{TAB_ID_PREFIX}{tab_id}")
}

pub fn window_dom_id(window_id: WindowId) -> String {
    format!("{WINDOW_ID_PREFIX}{window_id}")
}

/// The sidebar document as seen by the restoration engine.
///
/// Traversal methods only report element nodes. Lookups by id only find
/// nodes attached to the document.
pub trait DomHost {
    type Node: Clone + PartialEq + fmt::Debug;

    fn window_container(&self, window_id: WindowId) -> Option<Self::Node>;

    fn tab_element(&self, tab_id: TabId) -> Option<Self::Node>;

    /// Default parent of window containers
    fn tabbar(&self) -> Self::Node;

    /// Parse markup into detached top-level elements
    fn parse_fragment(&mut self, markup: &str) -> Result<Vec<Self::Node>, CacheError>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Move `node` under `parent`, before `reference` or at the end
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        node: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), CacheError>;

    /// Remove `node` from its parent, keeping its subtree
    fn detach(&mut self, node: &Self::Node);

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), CacheError>;

    fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), CacheError>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Lowercase tag name
    fn tag_name(&self, node: &Self::Node) -> String;

    /// Tab id stamped on a bound element, falling back to its DOM id
    fn bound_tab_id(&self, node: &Self::Node) -> Option<TabId> {
        self.attribute(node, TAB_ID_ATTR)
            .and_then(|value| value.trim().parse().ok())
            .or_else(|| parse_prefixed_id(&self.attribute(node, "id")?, TAB_ID_PREFIX))
    }
}
