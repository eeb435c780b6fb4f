/*
 * dom.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The output-tree boundary.
//!
//! Rendering never assumes a concrete node implementation. Everything it does
//! to the output goes through the [`Document`] trait. [`HtmlDocument`] is an
//! in-memory implementation that serializes to HTML, used by the CLI and tests
//! and suitable for server-side rendering.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::ast::TemplateNode;
use crate::error::TemplateResult;
use crate::escape::{escape_attribute, escape_text};
use crate::markup::parse_markup;
use crate::parser::is_void_element;

/// Operations the compiler and bindings need from a host document model.
///
/// Fragments follow DOM semantics: appending or inserting a fragment moves its
/// children into the target and leaves the fragment empty.
pub trait Document: 'static {
    /// A handle to a node. Clones refer to the same node; equality is identity.
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    fn create_fragment(&self) -> Self::Node;
    fn create_text(&self, text: &str) -> Self::Node;
    fn create_element(&self, tag: &str) -> Self::Node;
    fn append_child(&self, parent: &Self::Node, child: &Self::Node);
    fn set_attribute(&self, element: &Self::Node, name: &str, value: &str);

    /// Parse a markup string into a fragment, in the context of `context`.
    ///
    /// Implementations should recover from malformed markup the way a browser
    /// does; an error aborts the render.
    fn parse_fragment(&self, context: &Self::Node, markup: &str) -> TemplateResult<Self::Node>;

    // Mutation primitives used when bindings update an already-rendered tree.
    fn set_text(&self, node: &Self::Node, text: &str);
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
    fn last_child(&self, node: &Self::Node) -> Option<Self::Node>;
    fn insert_before(
        &self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    );
    fn remove_child(&self, parent: &Self::Node, child: &Self::Node);
}

/// What an [`HtmlNode`] is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Fragment,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Weak<RefCell<NodeData>>,
    children: Vec<HtmlNode>,
}

/// A node in an [`HtmlDocument`] tree.
#[derive(Clone)]
pub struct HtmlNode(Rc<RefCell<NodeData>>);

impl PartialEq for HtmlNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HtmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HtmlNode({})", self.outer_html())
    }
}

impl HtmlNode {
    fn new(kind: NodeKind) -> Self {
        HtmlNode(Rc::new(RefCell::new(NodeData {
            kind,
            parent: Weak::new(),
            children: Vec::new(),
        })))
    }

    pub fn kind(&self) -> NodeKind {
        self.0.borrow().kind.clone()
    }

    pub fn tag_name(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<HtmlNode> {
        self.0.borrow().children.clone()
    }

    pub fn parent(&self) -> Option<HtmlNode> {
        self.0.borrow().parent.upgrade().map(HtmlNode)
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(text) => text.clone(),
            _ => data.children.iter().map(|c| c.text_content()).collect(),
        }
    }

    /// Serialized children.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        let raw_text = self
            .tag_name()
            .is_some_and(|t| t.eq_ignore_ascii_case("script") || t.eq_ignore_ascii_case("style"));
        for child in self.0.borrow().children.iter() {
            child.serialize(&mut out, raw_text);
        }
        out
    }

    /// Serialized node, including itself. Fragments serialize as their children.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.serialize(&mut out, false);
        out
    }

    fn serialize(&self, out: &mut String, raw_text: bool) {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Fragment => out.push_str(&self.inner_html()),
            NodeKind::Text(text) if raw_text => out.push_str(text),
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                out.push_str(&self.inner_html());
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// A structurally identical, detached copy of this subtree.
    pub fn deep_clone(&self) -> HtmlNode {
        let copy = HtmlNode::new(self.kind());
        for child in self.children() {
            attach(&copy, &child.deep_clone(), None);
        }
        copy
    }

    fn is_fragment(&self) -> bool {
        matches!(self.0.borrow().kind, NodeKind::Fragment)
    }

    fn detach(&self) {
        let parent = self.parent();
        if let Some(parent) = parent {
            parent.0.borrow_mut().children.retain(|c| c != self);
        }
        self.0.borrow_mut().parent = Weak::new();
    }
}

/// Insert `child` into `parent` before `reference` (or at the end).
fn attach(parent: &HtmlNode, child: &HtmlNode, reference: Option<&HtmlNode>) {
    if parent == child {
        return;
    }
    let moved = if child.is_fragment() {
        std::mem::take(&mut child.0.borrow_mut().children)
    } else {
        child.detach();
        vec![child.clone()]
    };

    for node in &moved {
        node.0.borrow_mut().parent = Rc::downgrade(&parent.0);
    }

    let mut data = parent.0.borrow_mut();
    let index = reference
        .and_then(|r| data.children.iter().position(|c| c == r))
        .unwrap_or(data.children.len());
    data.children.splice(index..index, moved);
}

/// In-memory HTML document model.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlDocument;

impl HtmlDocument {
    pub fn new() -> Self {
        HtmlDocument
    }

    fn materialize(&self, parent: &HtmlNode, nodes: &[TemplateNode]) {
        for node in nodes {
            match node {
                TemplateNode::Text { text } => self.append_child(parent, &self.create_text(text)),
                TemplateNode::Element(element) => {
                    let el = self.create_element(&element.tag);
                    for attr in &element.attributes {
                        let value = attr.static_value().unwrap_or_default();
                        self.set_attribute(&el, &attr.name, &value);
                    }
                    self.materialize(&el, &element.children);
                    self.append_child(parent, &el);
                }
                // Markup parsing never produces mustaches.
                TemplateNode::Mustache(_) => {}
            }
        }
    }
}

impl Document for HtmlDocument {
    type Node = HtmlNode;

    fn create_fragment(&self) -> HtmlNode {
        HtmlNode::new(NodeKind::Fragment)
    }

    fn create_text(&self, text: &str) -> HtmlNode {
        HtmlNode::new(NodeKind::Text(text.to_string()))
    }

    fn create_element(&self, tag: &str) -> HtmlNode {
        HtmlNode::new(NodeKind::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
        })
    }

    fn append_child(&self, parent: &HtmlNode, child: &HtmlNode) {
        attach(parent, child, None);
    }

    fn set_attribute(&self, element: &HtmlNode, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut element.0.borrow_mut().kind {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn parse_fragment(&self, _context: &HtmlNode, markup: &str) -> TemplateResult<HtmlNode> {
        let fragment = self.create_fragment();
        self.materialize(&fragment, &parse_markup(markup));
        Ok(fragment)
    }

    fn set_text(&self, node: &HtmlNode, text: &str) {
        if let NodeKind::Text(current) = &mut node.0.borrow_mut().kind {
            *current = text.to_string();
        }
    }

    fn parent(&self, node: &HtmlNode) -> Option<HtmlNode> {
        node.parent()
    }

    fn next_sibling(&self, node: &HtmlNode) -> Option<HtmlNode> {
        let parent = node.parent()?;
        let data = parent.0.borrow();
        let index = data.children.iter().position(|c| c == node)?;
        data.children.get(index + 1).cloned()
    }

    fn first_child(&self, node: &HtmlNode) -> Option<HtmlNode> {
        node.0.borrow().children.first().cloned()
    }

    fn last_child(&self, node: &HtmlNode) -> Option<HtmlNode> {
        node.0.borrow().children.last().cloned()
    }

    fn insert_before(&self, parent: &HtmlNode, child: &HtmlNode, reference: Option<&HtmlNode>) {
        attach(parent, child, reference);
    }

    fn remove_child(&self, parent: &HtmlNode, child: &HtmlNode) {
        if child.parent().as_ref() == Some(parent) {
            child.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_and_serialize() {
        let doc = HtmlDocument::new();
        let div = doc.create_element("div");
        doc.set_attribute(&div, "class", "foo");
        doc.set_attribute(&div, "id", "bar");
        doc.append_child(&div, &doc.create_text("a < b & \"c\""));
        doc.append_child(&div, &doc.create_element("br"));

        assert_eq!(
            div.outer_html(),
            r#"<div class="foo" id="bar">a &lt; b &amp; "c"<br></div>"#
        );
    }

    #[test]
    fn test_set_attribute_replaces_in_place() {
        let doc = HtmlDocument::new();
        let a = doc.create_element("a");
        doc.set_attribute(&a, "href", "x");
        doc.set_attribute(&a, "title", "t");
        doc.set_attribute(&a, "href", "y\"z");
        assert_eq!(a.outer_html(), r#"<a href="y&quot;z" title="t"></a>"#);
    }

    #[test]
    fn test_appending_fragment_moves_children() {
        let doc = HtmlDocument::new();
        let div = doc.create_element("div");
        let frag = doc.parse_fragment(&div, "<b>h</b> tail").unwrap();
        doc.append_child(&div, &frag);

        assert_eq!(div.inner_html(), "<b>h</b> tail");
        assert!(frag.children().is_empty());
        assert_eq!(div.children()[0].parent(), Some(div.clone()));
    }

    #[test]
    fn test_insert_and_remove() {
        let doc = HtmlDocument::new();
        let ul = doc.create_element("ul");
        let first = doc.create_text("1");
        let last = doc.create_text("3");
        doc.append_child(&ul, &first);
        doc.append_child(&ul, &last);
        doc.insert_before(&ul, &doc.create_text("2"), Some(&last));
        assert_eq!(ul.text_content(), "123");

        assert_eq!(doc.next_sibling(&first).map(|n| n.text_content()), Some("2".into()));
        doc.remove_child(&ul, &first);
        assert_eq!(ul.text_content(), "23");
        assert_eq!(first.parent(), None);
    }

    #[test]
    fn test_parse_fragment_recovers() {
        let doc = HtmlDocument::new();
        let div = doc.create_element("div");
        let frag = doc.parse_fragment(&div, "<p>unclosed").unwrap();
        assert_eq!(frag.outer_html(), "<p>unclosed</p>");
    }

    #[test]
    fn test_raw_text_elements() {
        let doc = HtmlDocument::new();
        let frag = doc.parse_fragment(&doc.create_fragment(), "<style>a > b {}</style>").unwrap();
        assert_eq!(frag.outer_html(), "<style>a > b {}</style>");
    }

    #[test]
    fn test_deep_clone_is_detached() {
        let doc = HtmlDocument::new();
        let frag = doc.parse_fragment(&doc.create_fragment(), "<p>x</p>").unwrap();
        let copy = frag.deep_clone();
        doc.set_text(&frag.children()[0].children()[0], "y");
        assert_eq!(copy.outer_html(), "<p>x</p>");
        assert_eq!(frag.outer_html(), "<p>y</p>");
    }
}
