/// Sidebar document backed by the browser DOM
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlTemplateElement, Node};

use super::{DomHost, TABBAR_ID, tab_dom_id, window_dom_id};
use crate::error::CacheError;
use crate::tab_data::{TabId, WindowId};

fn dom_error(context: &str, e: wasm_bindgen::JsValue) -> CacheError {
    CacheError::Dom(format!("{}: {:?}", context, e))
}

pub struct WebDom {
    document: Document,
    tabbar: Element,
}

impl WebDom {
    pub fn new(document: Document, tabbar: Element) -> WebDom {
        WebDom { document, tabbar }
    }

    /// The current page's document and its `#tabbar`
    pub fn from_page() -> Result<WebDom, CacheError> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| CacheError::Dom("no document available".to_string()))?;
        let tabbar = document
            .get_element_by_id(TABBAR_ID)
            .ok_or_else(|| CacheError::Dom(format!("missing #{}", TABBAR_ID)))?;
        Ok(WebDom::new(document, tabbar))
    }
}

impl DomHost for WebDom {
    type Node = Element;

    fn window_container(&self, window_id: WindowId) -> Option<Element> {
        self.document.get_element_by_id(&window_dom_id(window_id))
    }

    fn tab_element(&self, tab_id: TabId) -> Option<Element> {
        self.document.get_element_by_id(&tab_dom_id(tab_id))
    }

    fn tabbar(&self) -> Element {
        self.tabbar.clone()
    }

    fn parse_fragment(&mut self, markup: &str) -> Result<Vec<Element>, CacheError> {
        let template = self
            .document
            .create_element("template")
            .map_err(|e| dom_error("Failed to create template", e))?
            .dyn_into::<HtmlTemplateElement>()
            .map_err(|_| CacheError::Dom("template is not an HTMLTemplateElement".to_string()))?;
        template.set_inner_html(markup);

        let content = template.content();
        let children = content.children();
        Ok((0..children.length()).filter_map(|i| children.item(i)).collect())
    }

    fn children(&self, node: &Element) -> Vec<Element> {
        let children = node.children();
        (0..children.length()).filter_map(|i| children.item(i)).collect()
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn next_sibling(&self, node: &Element) -> Option<Element> {
        node.next_element_sibling()
    }

    fn insert_before(&mut self, parent: &Element, node: &Element, reference: Option<&Element>) -> Result<(), CacheError> {
        let reference: Option<&Node> = reference.map(|r| r.as_ref());
        parent
            .insert_before(node, reference)
            .map(|_| ())
            .map_err(|e| dom_error("Failed to insert node", e))
    }

    fn detach(&mut self, node: &Element) {
        node.remove();
    }

    fn set_attribute(&mut self, node: &Element, name: &str, value: &str) -> Result<(), CacheError> {
        node.set_attribute(name, value)
            .map_err(|e| dom_error("Failed to set attribute", e))
    }

    fn remove_attribute(&mut self, node: &Element, name: &str) -> Result<(), CacheError> {
        node.remove_attribute(name)
            .map_err(|e| dom_error("Failed to remove attribute", e))
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name().to_ascii_lowercase()
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn page() -> WebDom {
        let document = web_sys::window().and_then(|w| w.document()).unwrap();
        let tabbar = match document.get_element_by_id(TABBAR_ID) {
            Some(tabbar) => tabbar,
            None => {
                let tabbar = document.create_element("div").unwrap();
                tabbar.set_id(TABBAR_ID);
                document.body().unwrap().append_child(&tabbar).unwrap();
                tabbar
            }
        };
        tabbar.set_inner_html("");
        WebDom::new(document, tabbar)
    }

    #[wasm_bindgen_test]
    fn test_parse_and_insert_container() {
        let mut dom = page();
        let nodes = dom
            .parse_fragment(r#"<ul id="window-5"><li id="tab-1"></li><li id="tab-2"></li></ul>"#)
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(dom.window_container(5).is_none());

        let tabbar = dom.tabbar();
        dom.insert_before(&tabbar, &nodes[0], None).unwrap();
        let container = dom.window_container(5).unwrap();
        assert_eq!(dom.children(&container).len(), 2);
        assert_eq!(dom.tab_element(2), dom.next_sibling(&dom.tab_element(1).unwrap()));
    }

    #[wasm_bindgen_test]
    fn test_attributes_and_detach() {
        let mut dom = page();
        let nodes = dom.parse_fragment(r#"<li id="tab-9"></li>"#).unwrap();
        let tabbar = dom.tabbar();
        dom.insert_before(&tabbar, &nodes[0], None).unwrap();

        dom.set_attribute(&nodes[0], "data-tab-id", "9").unwrap();
        assert_eq!(dom.bound_tab_id(&nodes[0]), Some(9));
        dom.remove_attribute(&nodes[0], "data-tab-id").unwrap();
        assert_eq!(dom.attribute(&nodes[0], "data-tab-id"), None);

        dom.detach(&nodes[0]);
        assert!(dom.tab_element(9).is_none());
        assert!(dom.parent(&nodes[0]).is_none());
    }
}
