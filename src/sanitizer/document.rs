//! Owned, mutable HTML document tree used by the sanitizer passes.
//!
//! `scraper` parses the markup; the result is copied into a [`Document`] whose
//! nodes carry plain owned data so passes can detach nodes and edit
//! attributes in place.

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::{Html, node::Node};

use crate::error::{Result, ViewerError};

/// HTML5 void elements that must not have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// HTML elements whose text children are serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// A node of the document tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomNode {
    Document,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element(ElementData),
    Text(String),
    Comment(String),
}

/// Tag name and ordered attributes of an element.
///
/// Elements from foreign content (SVG, MathML) are flagged so the serializer
/// never treats their text as raw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementData {
    name: String,
    attrs: Vec<(String, String)>,
    html: bool,
}

impl ElementData {
    /// A new element in the HTML namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            html: true,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `false` for SVG and MathML elements.
    pub fn is_html(&self) -> bool {
        self.html
    }

    pub fn is(&self, tag: &str) -> bool {
        self.name.eq_ignore_ascii_case(tag)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self
            .attrs
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(index).1)
    }

    /// Keep only the attributes for which `keep(name, value)` is `true`.
    pub fn retain_attrs(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.attrs.retain(|(k, v)| keep(k, v));
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }
}

/// Parsed HTML document.
#[derive(Clone, Debug)]
pub struct Document {
    tree: Tree<DomNode>,
}

impl Document {
    /// Parse a full HTML document.
    ///
    /// Fails with [`ViewerError::SanitizeParse`] when the parser panics or the
    /// result has no `<body>` (e.g. frameset documents).
    pub fn parse(html: &str) -> Result<Self> {
        let parsed = std::panic::catch_unwind(|| Html::parse_document(html))
            .map_err(|_| ViewerError::SanitizeParse("HTML parser panicked".into()))?;

        let mut tree = Tree::new(DomNode::Document);
        let root = tree.root().id();
        let mut stack: Vec<(NodeRef<'_, Node>, NodeId)> = parsed
            .tree
            .root()
            .children()
            .map(|child| (child, root))
            .collect();
        stack.reverse();

        while let Some((src, parent)) = stack.pop() {
            let value = match src.value() {
                Node::Doctype(doctype) => DomNode::Doctype {
                    name: doctype.name().to_string(),
                    public_id: doctype.public_id().to_string(),
                    system_id: doctype.system_id().to_string(),
                },
                Node::Comment(comment) => DomNode::Comment(String::from(&**comment)),
                Node::Text(text) => DomNode::Text(String::from(&**text)),
                Node::Element(el) => DomNode::Element(ElementData {
                    name: el.name().to_string(),
                    attrs: el
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    html: &*el.name.ns == HTML_NAMESPACE,
                }),
                _ => continue,
            };
            let Some(mut parent_node) = tree.get_mut(parent) else {
                continue;
            };
            let id = parent_node.append(value).id();

            let children: Vec<_> = src.children().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, id)));
        }

        let document = Self { tree };
        if document.body().is_none() {
            return Err(ViewerError::SanitizeParse("document has no <body>".into()));
        }
        Ok(document)
    }

    /// Ids of all attached elements, in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.tree
            .root()
            .descendants()
            .filter(|n| matches!(n.value(), DomNode::Element(_)))
            .map(|n| n.id())
            .collect()
    }

    /// Ids of all attached elements with the given tag name, in document order.
    pub fn elements_named(&self, tag: &str) -> Vec<NodeId> {
        self.tree
            .root()
            .descendants()
            .filter(|n| matches!(n.value(), DomNode::Element(el) if el.is(tag)))
            .map(|n| n.id())
            .collect()
    }

    pub fn find_first(&self, tag: &str) -> Option<NodeId> {
        self.tree
            .root()
            .descendants()
            .find(|n| matches!(n.value(), DomNode::Element(el) if el.is(tag)))
            .map(|n| n.id())
    }

    pub fn head(&self) -> Option<NodeId> {
        self.find_first("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.find_first("body")
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.parent().map(|n| n.id())
    }

    /// Ids of elements named `tag` inside `root`, excluding `root` itself.
    pub fn elements_named_within(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let Some(root) = self.tree.get(root) else {
            return Vec::new();
        };
        root.descendants()
            .skip(1)
            .filter(|n| matches!(n.value(), DomNode::Element(el) if el.is(tag)))
            .map(|n| n.id())
            .collect()
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.tree.get(id) else {
            return String::new();
        };
        node.descendants()
            .filter_map(|n| match n.value() {
                DomNode::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.tree.get(id)?.value() {
            DomNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Run `edit` on the element `id`, returning its result.
    pub fn with_element_mut<R>(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut ElementData) -> R,
    ) -> Option<R> {
        let mut node = self.tree.get_mut(id)?;
        match node.value() {
            DomNode::Element(el) => Some(edit(el)),
            _ => None,
        }
    }

    /// Detach a node (and its subtree) from the document.
    pub fn remove(&mut self, id: NodeId) -> bool {
        match self.tree.get_mut(id) {
            Some(mut node) => {
                node.detach();
                true
            }
            None => false,
        }
    }

    pub fn append_child(&mut self, parent: NodeId, node: DomNode) -> Option<NodeId> {
        let mut parent = self.tree.get_mut(parent)?;
        Some(parent.append(node).id())
    }

    pub fn prepend_child(&mut self, parent: NodeId, node: DomNode) -> Option<NodeId> {
        let mut parent = self.tree.get_mut(parent)?;
        Some(parent.prepend(node).id())
    }

    /// First element child of `parent`, skipping text and comments.
    pub fn first_element_child(&self, parent: NodeId) -> Option<NodeId> {
        self.tree
            .get(parent)?
            .children()
            .find(|n| matches!(n.value(), DomNode::Element(_)))
            .map(|n| n.id())
    }

    /// Serialize the document back to HTML.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        serialize_node(self.tree.root(), false, &mut out);
        out
    }
}

fn serialize_node(node: NodeRef<DomNode>, raw_text: bool, out: &mut String) {
    match node.value() {
        DomNode::Document => {
            for child in node.children() {
                serialize_node(child, false, out);
            }
        }
        DomNode::Doctype {
            name,
            public_id,
            system_id,
        } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            if !public_id.is_empty() {
                out.push_str(" PUBLIC \"");
                out.push_str(public_id);
                out.push('"');
                if !system_id.is_empty() {
                    out.push_str(" \"");
                    out.push_str(system_id);
                    out.push('"');
                }
            } else if !system_id.is_empty() {
                out.push_str(" SYSTEM \"");
                out.push_str(system_id);
                out.push('"');
            }
            out.push('>');
        }
        DomNode::Element(el) => {
            let tag = el.name();
            out.push('<');
            out.push_str(tag);
            for (k, v) in el.attrs() {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                escape_into(v, true, out);
                out.push('"');
            }
            out.push('>');

            if el.html && VOID_ELEMENTS.contains(&tag) {
                return;
            }

            let raw_children = el.html && RAW_TEXT_ELEMENTS.contains(&tag);
            for child in node.children() {
                serialize_node(child, raw_children, out);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        DomNode::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_into(text, false, out);
            }
        }
        DomNode::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
    }
}

pub(crate) fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
