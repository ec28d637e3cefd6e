//! Minimal owned XML DOM.
//!
//! The engine consumes document XML and emits API requests; it never
//! regenerates a document. This module therefore keeps only what the
//! pipeline needs: an element tree that preserves attribute order and text
//! verbatim, plus a serializer faithful enough to round-trip fragments
//! through the change tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{DocError, Result};

/// A node in the element tree: either a child element or a run of text.
///
/// Text between sibling elements is kept as its own node, so traversals see
/// exactly the interleaving the source had.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with ordered attributes and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Value of the first attribute with this name, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value or appending.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.attrs.iter_mut().find(|(k, _)| k == name) {
            entry.1 = value.to_string();
            return;
        }
        self.attrs.push((name.to_string(), value.to_string()));
    }

    /// Direct child elements, skipping text nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First direct child element with the given tag.
    pub fn find(&self, tag: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.name == tag)
    }

    /// All direct child elements with the given tag, in order.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.child_elements().filter(move |e| e.name == tag)
    }

    /// All elements in the subtree (self included), depth-first.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            let elem = out[i];
            for child in elem.child_elements() {
                out.push(child);
            }
            i += 1;
        }
        out
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Serialize back to an XML string.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            escape_into(value, true, out);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write(out),
                XmlNode::Text(t) => escape_into(t, false, out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn collect_text(elem: &XmlElement, out: &mut String) {
    for child in &elem.children {
        match child {
            XmlNode::Text(t) => out.push_str(t),
            XmlNode::Element(e) => collect_text(e, out),
        }
    }
}

fn escape_into(text: &str, in_attr: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

/// Parse an XML document and return its root element.
pub fn parse(input: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let elem = element_from_start(&start)?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::End(_) => {
                let elem = stack
                    .pop()
                    .ok_or_else(|| DocError::Parse("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::Text(text) => {
                let value = text.unescape()?.into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(value));
                }
                // Text outside the root (prologue whitespace) is dropped.
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(value));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes.
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DocError::Parse(format!(
            "unclosed element <{}>",
            stack[stack.len() - 1].name
        )));
    }
    root.ok_or_else(|| DocError::Parse("document has no root element".to_string()))
}

/// Parse a fragment that may contain several top-level elements by wrapping
/// it in a synthetic root. Returns the wrapper element.
pub fn parse_fragment(fragment: &str) -> Result<XmlElement> {
    parse(&format!("<fragment-root>{fragment}</fragment-root>"))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut elem = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        elem.attrs.push((key, value));
    }
    Ok(elem)
}

fn attach(
    stack: &mut Vec<XmlElement>,
    root: &mut Option<XmlElement>,
    elem: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(elem));
    } else if root.is_none() {
        *root = Some(elem);
    } else {
        return Err(DocError::Parse(
            "multiple root elements in document".to_string(),
        ));
    }
    Ok(())
}
