/// Fragment parser and trimmer for the cached sidebar markup
///
/// The cache blob is a container element holding one item element per tab:
///
/// ```text
/// <ul id="window-1" class="tabs" data-window-id="1">
///   <li id="tab-12" class="tab contextual-identity-default pinned" data-parent-id="4">...</li>
/// </ul>
/// ```
///
/// Attribute values may span lines and contain `>`, and items contain nested
/// elements, so fragments are delimited by a small tag parser instead of
/// pattern matching on the raw text.
use std::borrow::Cow;
use std::ops::Range;

use crate::tab_data::{DEFAULT_COOKIE_STORE_ID, TabId, TabRecord, WindowId};

pub const CONTAINER_TAG: &str = "ul";
pub const ITEM_TAG: &str = "li";

pub const TAB_ID_PREFIX: &str = "tab-";
pub const WINDOW_ID_PREFIX: &str = "window-";

pub const TAB_ID_ATTR: &str = "data-tab-id";
pub const WINDOW_ID_ATTR: &str = "data-window-id";
pub const PARENT_ATTR: &str = "data-parent-id";

pub const COOKIE_STORE_CLASS_PREFIX: &str = "contextual-identity-";
pub const INCOGNITO_CLASS: &str = "incognito";
pub const PINNED_CLASS: &str = "pinned";

const VOID_TAGS: &[&str] = &["area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr"];

/// A parsed markup node
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    Element(Element),
    Text(String),
}

/// A parsed element with the byte ranges it occupies in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
    /// Whole element, from `<` of the open tag to the end of its close tag
    pub span: Range<usize>,
    /// Content between the open and close tags
    pub inner: Range<usize>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        elements(&self.children)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Tab id encoded in the `id` attribute, if well formed
    pub fn tab_id(&self) -> Option<TabId> {
        parse_prefixed_id(self.attribute("id")?, TAB_ID_PREFIX)
    }

    /// Raw tab id of the parent item, if present and well formed
    pub fn parent_tab_id(&self) -> Option<TabId> {
        self.attribute(PARENT_ATTR)?.trim().parse().ok()
    }

    pub fn cookie_store_id(&self) -> Option<&str> {
        self.classes()
            .find_map(|c| c.strip_prefix(COOKIE_STORE_CLASS_PREFIX))
            .filter(|id| !id.is_empty())
    }
}

/// Iterate over the element nodes of a node list
pub fn elements(nodes: &[MarkupNode]) -> impl Iterator<Item = &Element> {
    nodes.iter().filter_map(|node| match node {
        MarkupNode::Element(element) => Some(element),
        MarkupNode::Text(_) => None,
    })
}

pub fn parse_prefixed_id(value: &str, prefix: &str) -> Option<i64> {
    value.trim().strip_prefix(prefix)?.parse().ok()
}

/// Parse a markup fragment into its top-level nodes.
///
/// Parsing never fails: stray close tags are ignored, unclosed elements end at
/// the close tag of an enclosing element or at the end of input, and
/// whitespace-only text is dropped.
pub fn parse_fragment(src: &str) -> Vec<MarkupNode> {
    let mut parser = Parser { src, pos: 0 };
    let mut stack: Vec<Element> = Vec::new();
    let mut roots: Vec<MarkupNode> = Vec::new();

    while parser.pos < src.len() {
        let rest = &src[parser.pos..];

        if rest.starts_with("<!--") {
            parser.pos = rest[4..]
                .find("-->")
                .map(|i| parser.pos + 4 + i + 3)
                .unwrap_or(src.len());
            continue;
        }

        if rest.starts_with("</") {
            let (name, start, end) = parser.close_tag();
            close_element(&mut stack, &mut roots, &name, start, end);
            continue;
        }

        if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let start = parser.pos;
            let (tag, attributes, self_closing) = parser.open_tag();
            let end = parser.pos;
            let element = Element {
                tag,
                attributes,
                children: Vec::new(),
                span: start..end,
                inner: end..end,
            };
            if self_closing || VOID_TAGS.contains(&element.tag.as_str()) {
                push_node(&mut stack, &mut roots, MarkupNode::Element(element));
            } else {
                stack.push(element);
            }
            continue;
        }

        let start = parser.pos;
        let skip = rest.chars().next().map(char::len_utf8).unwrap_or(1);
        let end = rest[skip..]
            .find('<')
            .map(|i| start + skip + i)
            .unwrap_or(src.len());
        parser.pos = end;
        let text = &src[start..end];
        if !text.trim().is_empty() {
            push_node(&mut stack, &mut roots, MarkupNode::Text(decode_entities(text)));
        }
    }

    while let Some(mut element) = stack.pop() {
        element.inner.end = src.len();
        element.span.end = src.len();
        push_node(&mut stack, &mut roots, MarkupNode::Element(element));
    }

    roots
}

fn push_node(stack: &mut [Element], roots: &mut Vec<MarkupNode>, node: MarkupNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn close_element(stack: &mut Vec<Element>, roots: &mut Vec<MarkupNode>, name: &str, start: usize, end: usize) {
    let Some(position) = stack.iter().rposition(|element| element.tag == name) else {
        return;
    };

    // Elements opened after the matching one end where the close tag starts
    while stack.len() > position + 1 {
        if let Some(mut element) = stack.pop() {
            element.inner.end = start;
            element.span.end = start;
            push_node(stack, roots, MarkupNode::Element(element));
        }
    }

    if let Some(mut element) = stack.pop() {
        element.inner.end = start;
        element.span.end = end;
        push_node(stack, roots, MarkupNode::Element(element));
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        let rest = &self.src[start..];
        let len = rest
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += len;
        &self.src[start..start + len]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    /// Parse `<name attr="value" ...>` starting at `<`
    fn open_tag(&mut self) -> (String, Vec<(String, String)>, bool) {
        self.pos += 1;
        let name = self
            .take_while(|c| !c.is_whitespace() && c != '>' && c != '/')
            .to_ascii_lowercase();
        let mut attributes = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return (name, attributes, false),
                Some('>') => {
                    self.pos += 1;
                    return (name, attributes, false);
                }
                Some('/') => {
                    self.pos += 1;
                    if self.peek() == Some('>') {
                        self.pos += 1;
                        return (name, attributes, true);
                    }
                }
                Some(c) => {
                    let attr_name = self
                        .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
                        .to_ascii_lowercase();
                    if attr_name.is_empty() {
                        // a bare `=`
                        self.pos += c.len_utf8();
                        continue;
                    }
                    self.skip_whitespace();
                    let value = if self.peek() == Some('=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        self.attribute_value()
                    } else {
                        String::new()
                    };
                    attributes.push((attr_name, value));
                }
            }
        }
    }

    fn attribute_value(&mut self) -> String {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                let end = self.src[start..]
                    .find(quote)
                    .map(|i| start + i)
                    .unwrap_or(self.src.len());
                self.pos = (end + 1).min(self.src.len());
                decode_entities(&self.src[start..end])
            }
            _ => decode_entities(self.take_while(|c| !c.is_whitespace() && c != '>')),
        }
    }

    /// Parse `</name>` starting at `<`, returning the name and the tag's byte range
    fn close_tag(&mut self) -> (String, usize, usize) {
        let start = self.pos;
        self.pos += 2;
        let name = self
            .take_while(|c| c.is_ascii_alphanumeric() || c == '-')
            .to_ascii_lowercase();
        self.pos = self.src[self.pos..]
            .find('>')
            .map(|i| self.pos + i + 1)
            .unwrap_or(self.src.len());
        (name, start, self.pos)
    }
}

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Item elements of a parsed cache: the top-level items when the container
/// wrapper was already stripped, the container's items otherwise.
pub fn item_elements(nodes: &[MarkupNode]) -> Vec<&Element> {
    let top: Vec<&Element> = elements(nodes).collect();
    if top.iter().any(|element| element.tag == ITEM_TAG) {
        return top.into_iter().filter(|element| element.tag == ITEM_TAG).collect();
    }
    top.first()
        .map(|container| {
            container
                .element_children()
                .filter(|element| element.tag == ITEM_TAG)
                .collect()
        })
        .unwrap_or_default()
}

pub fn count_items(markup: &str) -> usize {
    item_elements(&parse_fragment(markup)).len()
}

/// Drop the first `ignore_count` item fragments, keeping the container wrapper.
pub fn trim_markup(markup: &str, ignore_count: usize) -> String {
    if ignore_count == 0 {
        return markup.to_string();
    }

    let nodes = parse_fragment(markup);
    let items = item_elements(&nodes);
    let Some(first) = items.first() else {
        return markup.to_string();
    };
    let last = items[ignore_count.min(items.len()) - 1];

    format!("{}{}", &markup[..first.span.start], &markup[last.span.end..])
}

/// Content of the container element, or the whole markup when there is no wrapper.
pub fn strip_container(markup: &str) -> &str {
    let nodes = parse_fragment(markup);
    match elements(&nodes).next() {
        Some(container) if container.tag != ITEM_TAG => &markup[container.inner.clone()],
        _ => markup,
    }
}

/// Cookie store id as it appears in a class token and in signature lines.
/// Whitespace would split the class and `,` would split the signature line,
/// so both become `_`.
pub fn cookie_store_token(id: &str) -> Cow<'_, str> {
    let unsafe_char = |c: char| c.is_whitespace() || c == ',';
    if id.is_empty() {
        Cow::Borrowed(DEFAULT_COOKIE_STORE_ID)
    } else if id.contains(unsafe_char) {
        Cow::Owned(id.chars().map(|c| if unsafe_char(c) { '_' } else { c }).collect())
    } else {
        Cow::Borrowed(id)
    }
}

/// Serialize a window's tabs in the cache blob format.
pub fn serialize_tabs(window_id: WindowId, tabs: &[TabRecord]) -> String {
    let mut out = format!(
        "<{CONTAINER_TAG} id=\"{WINDOW_ID_PREFIX}{window_id}\" class=\"tabs\" {WINDOW_ID_ATTR}=\"{window_id}\">\n"
    );

    for tab in tabs {
        let mut classes = vec![
            "tab".to_string(),
            format!("{COOKIE_STORE_CLASS_PREFIX}{}", cookie_store_token(&tab.cookie_store_id)),
        ];
        if tab.incognito {
            classes.push(INCOGNITO_CLASS.to_string());
        }
        if tab.pinned {
            classes.push(PINNED_CLASS.to_string());
        }
        if tab.collapsed {
            classes.push("subtree-collapsed".to_string());
        }

        out.push_str(&format!(
            "<{ITEM_TAG} id=\"{TAB_ID_PREFIX}{}\" class=\"{}\"",
            tab.id,
            escape_attribute(&classes.join(" "))
        ));
        if let Some(parent_id) = tab.parent_id {
            out.push_str(&format!(" {PARENT_ATTR}=\"{parent_id}\""));
        }
        out.push_str("><span class=\"twisty\"></span><span class=\"label\"></span></li>\n");
    }

    out.push_str(&format!("</{CONTAINER_TAG}>"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI_LINE: &str = "<ul id=\"window-1\">\n\
        <li id=\"tab-1\" class=\"tab\"\n    title=\"first\nline > two\"><span>a</span></li>\n\
        <li id=\"tab-2\" class=\"tab pinned\"><span><b>b</b></span>\n</li>\n\
        <li id=\"tab-3\" class=\"tab\"><span>c</span></li>\n\
        </ul>";

    fn first_element(nodes: &[MarkupNode]) -> &Element {
        elements(nodes).next().unwrap()
    }

    #[test]
    fn test_parse_attributes() {
        let nodes = parse_fragment(r#"<li id="tab-4" class='a b' data-parent-id=2 hidden>x</li>"#);
        let li = first_element(&nodes);

        assert_eq!(li.tag, "li");
        assert_eq!(li.attribute("id"), Some("tab-4"));
        assert_eq!(li.attribute("class"), Some("a b"));
        assert_eq!(li.attribute(PARENT_ATTR), Some("2"));
        assert_eq!(li.attribute("hidden"), Some(""));
        assert_eq!(li.children, vec![MarkupNode::Text("x".to_string())]);
    }

    #[test]
    fn test_parse_multi_line_attribute() {
        let nodes = parse_fragment(MULTI_LINE);
        let items = item_elements(&nodes);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].attribute("title"), Some("first\nline > two"));
        assert_eq!(items[1].tab_id(), Some(2));
    }

    #[test]
    fn test_nested_close_tags_stay_in_fragment() {
        let nodes = parse_fragment(MULTI_LINE);
        let items = item_elements(&nodes);
        let second = &MULTI_LINE[items[1].span.clone()];

        assert!(second.starts_with("<li id=\"tab-2\""));
        assert!(second.ends_with("</li>"));
        assert!(second.contains("<b>b</b></span>"));
    }

    #[test]
    fn test_unclosed_and_stray_tags() {
        let nodes = parse_fragment("<ul><li id=\"tab-1\"><span>open</li></div><li id=\"tab-2\">");
        let items = item_elements(&nodes);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].element_children().count(), 1);
        assert_eq!(items[1].tab_id(), Some(2));
    }

    #[test]
    fn test_comments_and_entities() {
        let nodes = parse_fragment("<!-- <li id=\"tab-9\"> --><li id=\"tab-1\" title=\"a &amp; &quot;b&quot;\"></li>");
        let items = item_elements(&nodes);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].attribute("title"), Some("a & \"b\""));
    }

    #[test]
    fn test_item_attribute_helpers() {
        let nodes = parse_fragment(
            r#"<li id="tab-x" class="tab contextual-identity-firefox-container-2 incognito" data-parent-id="abc"></li>"#,
        );
        let li = first_element(&nodes);

        assert_eq!(li.tab_id(), None);
        assert_eq!(li.parent_tab_id(), None);
        assert_eq!(li.cookie_store_id(), Some("firefox-container-2"));
        assert!(li.has_class(INCOGNITO_CLASS));
        assert!(!li.has_class(PINNED_CLASS));
    }

    #[test]
    fn test_trim_markup() {
        let trimmed = trim_markup(MULTI_LINE, 2);

        assert_eq!(count_items(&trimmed), 1);
        assert!(trimmed.starts_with("<ul id=\"window-1\">\n"));
        assert!(trimmed.contains("tab-3"));
        assert!(!trimmed.contains("tab-2"));
        assert!(!trimmed.contains("line > two"));
    }

    #[test]
    fn test_trim_markup_noop_and_overflow() {
        assert_eq!(trim_markup(MULTI_LINE, 0), MULTI_LINE);
        assert_eq!(trim_markup(&trim_markup(MULTI_LINE, 2), 0), trim_markup(MULTI_LINE, 2));
        assert_eq!(count_items(&trim_markup(MULTI_LINE, 10)), 0);
    }

    #[test]
    fn test_trim_markup_without_wrapper() {
        let inner = strip_container(MULTI_LINE);
        let trimmed = trim_markup(inner, 1);

        assert_eq!(count_items(inner), 3);
        assert_eq!(count_items(&trimmed), 2);
    }

    #[test]
    fn test_strip_container() {
        let inner = strip_container(MULTI_LINE);

        assert!(inner.starts_with('\n'));
        assert!(!inner.contains("<ul"));
        assert!(!inner.contains("</ul>"));
        assert_eq!(strip_container("<li id=\"tab-1\"></li>"), "<li id=\"tab-1\"></li>");
    }

    #[test]
    fn test_serialize_tabs() {
        let tabs = vec![
            TabRecord::new(10, 1).pinned(),
            TabRecord::new(11, 1).with_parent(10).incognito(),
        ];
        let markup = serialize_tabs(1, &tabs);
        let nodes = parse_fragment(&markup);
        let container = first_element(&nodes);
        let items = item_elements(&nodes);

        assert_eq!(container.attribute("id"), Some("window-1"));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].cookie_store_id(), Some(DEFAULT_COOKIE_STORE_ID));
        assert!(items[0].has_class(PINNED_CLASS));
        assert_eq!(items[1].parent_tab_id(), Some(10));
        assert!(items[1].has_class(INCOGNITO_CLASS));
    }

    #[test]
    fn test_serialize_cookie_store_with_whitespace() {
        let tabs = vec![TabRecord::new(1, 1).with_cookie_store("work stuff\tnew")];
        let markup = serialize_tabs(1, &tabs);
        let nodes = parse_fragment(&markup);
        let items = item_elements(&nodes);

        let identity_classes = items[0]
            .classes()
            .filter(|class| class.starts_with(COOKIE_STORE_CLASS_PREFIX))
            .count();
        assert_eq!(identity_classes, 1);
        assert_eq!(items[0].cookie_store_id(), Some("work_stuff_new"));
        assert!(!items[0].has_class("stuff"));
    }

    #[test]
    fn test_cookie_store_token() {
        assert_eq!(cookie_store_token("firefox-container-1"), "firefox-container-1");
        assert_eq!(cookie_store_token("a b,c"), "a_b_c");
        assert_eq!(cookie_store_token(""), DEFAULT_COOKIE_STORE_ID);
    }
}
