/// In-memory document for headless use and tests
use super::{DomHost, TABBAR_ID, tab_dom_id, window_dom_id};
use crate::error::CacheError;
use crate::markup::{self, MarkupNode, escape_attribute};
use crate::tab_data::{TabId, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed element tree. Nodes are never freed; detached nodes simply
/// stop being reachable from the document root.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<NodeData>,
    root: NodeId,
    tabbar: NodeId,
}

impl MemoryDom {
    /// A document whose body holds an empty `#tabbar`
    pub fn new() -> MemoryDom {
        let mut dom = MemoryDom {
            nodes: Vec::new(),
            root: NodeId(0),
            tabbar: NodeId(0),
        };
        dom.root = dom.create_element("body", Vec::new());
        dom.tabbar = dom.create_element("div", vec![("id".to_string(), TABBAR_ID.to_string())]);
        dom.append(dom.root, dom.tabbar);
        dom
    }

    /// Parse markup and append it to the tabbar
    pub fn load(&mut self, markup: &str) -> Vec<NodeId> {
        let nodes = self.build(&markup::parse_fragment(markup));
        for &node in &nodes {
            self.append(self.tabbar, node);
        }
        nodes
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let mut pending = vec![self.root];
        while let Some(node) = pending.pop() {
            if self.attribute_ref(node, "id") == Some(id) {
                return Some(node);
            }
            pending.extend(self.nodes[node.0].children.iter().rev());
        }
        None
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_attribute(value)));
                }
                out.push('>');
                for &child in &self.nodes[node.0].children {
                    self.write_html(child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }

    fn create_element(&mut self, tag: &str, attributes: Vec<(String, String)>) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_string(),
            attributes,
        })
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    fn build(&mut self, nodes: &[MarkupNode]) -> Vec<NodeId> {
        nodes
            .iter()
            .map(|node| match node {
                MarkupNode::Text(text) => self.push(NodeKind::Text(text.clone())),
                MarkupNode::Element(element) => {
                    let id = self.create_element(&element.tag, element.attributes.clone());
                    for child in self.build(&element.children) {
                        self.append(id, child);
                    }
                    id
                }
            })
            .collect()
    }

    fn append(&mut self, parent: NodeId, node: NodeId) {
        self.unlink(node);
        self.nodes[parent.0].children.push(node);
        self.nodes[node.0].parent = Some(parent);
    }

    fn unlink(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != node);
        }
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.0].kind, NodeKind::Element { .. })
    }

    fn attribute_ref(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl DomHost for MemoryDom {
    type Node = NodeId;

    fn window_container(&self, window_id: WindowId) -> Option<NodeId> {
        self.get_element_by_id(&window_dom_id(window_id))
    }

    fn tab_element(&self, tab_id: TabId) -> Option<NodeId> {
        self.get_element_by_id(&tab_dom_id(tab_id))
    }

    fn tabbar(&self) -> NodeId {
        self.tabbar
    }

    fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>, CacheError> {
        let nodes = self.build(&markup::parse_fragment(markup));
        Ok(nodes.into_iter().filter(|&node| self.is_element(node)).collect())
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes[node.0]
            .children
            .iter()
            .copied()
            .filter(|&child| self.is_element(child))
            .collect()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let position = siblings.iter().position(|child| child == node)?;
        siblings[position + 1..]
            .iter()
            .copied()
            .find(|&sibling| self.is_element(sibling))
    }

    fn insert_before(&mut self, parent: &NodeId, node: &NodeId, reference: Option<&NodeId>) -> Result<(), CacheError> {
        if self.is_ancestor_or_self(*node, *parent) {
            return Err(CacheError::Dom("cannot insert a node into its own subtree".to_string()));
        }
        if let Some(reference) = reference {
            if self.nodes[reference.0].parent != Some(*parent) {
                return Err(CacheError::Dom("reference node is not a child of the parent".to_string()));
            }
        }

        self.unlink(*node);
        let children = &mut self.nodes[parent.0].children;
        let position = reference
            .and_then(|reference| children.iter().position(|child| child == reference))
            .unwrap_or(children.len());
        children.insert(position, *node);
        self.nodes[node.0].parent = Some(*parent);
        Ok(())
    }

    fn detach(&mut self, node: &NodeId) {
        self.unlink(*node);
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), CacheError> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(key, _)| key == name) {
                    Some((_, existing)) => *existing = value.to_string(),
                    None => attributes.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            NodeKind::Text(_) => Err(CacheError::Dom("cannot set an attribute on a text node".to_string())),
        }
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), CacheError> {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node.0].kind {
            attributes.retain(|(key, _)| key != name);
        }
        Ok(())
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.attribute_ref(*node, name).map(str::to_string)
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.tag(*node).unwrap_or_default().to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: &str = r#"<ul id="window-3"> <li id="tab-1"><span>one</span></li> <li id="tab-2"></li> </ul>"#;

    #[test]
    fn test_load_and_lookup() {
        let mut dom = MemoryDom::new();
        let loaded = dom.load(WINDOW);
        let container = dom.window_container(3).unwrap();

        assert_eq!(loaded, vec![container]);
        assert_eq!(dom.children(&container).len(), 2);
        assert_eq!(dom.tab_element(2), Some(dom.children(&container)[1]));
        assert_eq!(dom.tab_element(9), None);
        assert_eq!(dom.parent(&container), Some(dom.tabbar()));
        assert_eq!(dom.tag_name(&container), "ul");
    }

    #[test]
    fn test_detached_nodes_are_not_found() {
        let mut dom = MemoryDom::new();
        dom.load(WINDOW);
        let container = dom.window_container(3).unwrap();

        dom.detach(&container);

        assert!(!dom.is_connected(container));
        assert_eq!(dom.window_container(3), None);
        assert_eq!(dom.tab_element(1), None);
        assert_eq!(dom.children(&container).len(), 2);
    }

    #[test]
    fn test_insert_before_and_siblings() {
        let mut dom = MemoryDom::new();
        dom.load(WINDOW);
        let container = dom.window_container(3).unwrap();
        let second = dom.tab_element(2).unwrap();
        let fresh = dom.parse_fragment(r#"<li id="tab-5"></li>"#).unwrap();

        dom.insert_before(&container, &fresh[0], Some(&second)).unwrap();

        let first = dom.tab_element(1).unwrap();
        assert_eq!(dom.next_sibling(&first), Some(fresh[0]));
        assert_eq!(dom.next_sibling(&fresh[0]), Some(second));
        assert_eq!(dom.next_sibling(&second), None);
    }

    #[test]
    fn test_insert_rejects_foreign_reference() {
        let mut dom = MemoryDom::new();
        dom.load(WINDOW);
        let tabbar = dom.tabbar();
        let tab = dom.tab_element(1).unwrap();
        let fresh = dom.parse_fragment("<li></li>").unwrap();

        let result = dom.insert_before(&tabbar, &fresh[0], Some(&tab));

        assert!(matches!(result, Err(CacheError::Dom(_))));
    }

    #[test]
    fn test_attributes_and_html() {
        let mut dom = MemoryDom::new();
        let nodes = dom.parse_fragment(r#"<li id="tab-1" class="tab">x</li>"#).unwrap();

        dom.set_attribute(&nodes[0], "id", "tab-10").unwrap();
        dom.set_attribute(&nodes[0], "data-tab-id", "10").unwrap();
        dom.remove_attribute(&nodes[0], "class").unwrap();

        assert_eq!(dom.attribute(&nodes[0], "id").as_deref(), Some("tab-10"));
        assert_eq!(dom.bound_tab_id(&nodes[0]), Some(10));
        assert_eq!(dom.outer_html(nodes[0]), r#"<li id="tab-10" data-tab-id="10">x</li>"#);
    }
}
