//! Owned XML tree for property list documents
//!
//! Documents are parsed with `roxmltree` into an owned element tree so they can
//! be mutated in place and written back. Insignificant whitespace (blank text
//! between elements) is dropped on load; the serializer re-indents the tree
//! deterministically, so loading and saving an unchanged document twice gives
//! identical bytes.

use std::fs;
use std::path::Path;

use crate::error::PlistError;

/// XML declaration written at the top of every saved document
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// A node in the owned tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    /// The element behind this node, if it is one
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// An XML element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element holding a single text child
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.set_text(text);
        element
    }

    /// Append a child element, returning `self` for chaining
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Check the element name
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Concatenated text content of the direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Node::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(Node::Text(text));
        }
    }

    /// Iterate over child elements, skipping text and comments
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First descendant (or self) with the given name, in document order
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.is(name) {
            return Some(self);
        }
        self.elements().find_map(|child| child.find(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        if self.is(name) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find_map(|child| child.find_mut(name))
    }
}

/// A parsed property list document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlistDocument {
    doctype: Option<String>,
    root: Element,
}

impl PlistDocument {
    /// Parse a document from its XML source
    ///
    /// Returns the parser message on failure; [`PlistDocument::load`] wraps it
    /// with the file path.
    pub fn parse(source: &str) -> Result<Self, String> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(source, options)
            .map_err(|e| e.to_string())?;

        Ok(Self {
            doctype: extract_doctype(source),
            root: convert(doc.root_element()),
        })
    }

    /// Load and parse a document from disk
    pub fn load(path: &Path) -> Result<Self, PlistError> {
        let source = fs::read_to_string(path).map_err(|source| PlistError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source).map_err(|message| PlistError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Serialize and write the whole document to disk
    pub fn save(&self, path: &Path) -> Result<(), PlistError> {
        fs::write(path, self.to_xml()).map_err(|source| PlistError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The document type declaration, verbatim, if the source had one
    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    /// The first `<dict>` in document order (the plist's top-level dict)
    pub fn dict(&self) -> Option<&Element> {
        self.root.find("dict")
    }

    pub fn dict_mut(&mut self) -> Option<&mut Element> {
        self.root.find_mut("dict")
    }

    /// Serialize to XML text
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(512);
        out.push_str(XML_DECLARATION);
        out.push('\n');
        if let Some(doctype) = &self.doctype {
            out.push_str(doctype);
            out.push('\n');
        }
        write_element(&mut out, &self.root, 0);
        out
    }
}

fn convert(node: roxmltree::Node) -> Element {
    let mut element = Element::new(node.tag_name().name());
    element.attributes = node
        .attributes()
        .map(|attr| (attr.name().to_string(), attr.value().to_string()))
        .collect();

    let has_element_children = node.children().any(|child| child.is_element());

    for child in node.children() {
        match child.node_type() {
            roxmltree::NodeType::Element => element.children.push(Node::Element(convert(child))),
            roxmltree::NodeType::Text => {
                let text = child.text().unwrap_or_default();
                // Blank text between elements is layout, not content
                if has_element_children && text.trim().is_empty() {
                    continue;
                }
                element.children.push(Node::Text(text.to_string()));
            }
            roxmltree::NodeType::Comment => {
                element
                    .children
                    .push(Node::Comment(child.text().unwrap_or_default().to_string()));
            }
            _ => {}
        }
    }

    element
}

fn extract_doctype(source: &str) -> Option<String> {
    let start = source.find("<!DOCTYPE")?;
    let rest = &source[start..];
    let close = rest.find('>')?;
    let end = match rest.find('[') {
        Some(bracket) if bracket < close => rest.find("]>")? + 2,
        _ => close + 1,
    };
    Some(rest[..end].to_string())
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    indent(out, depth);
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value, true));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>\n");
        return;
    }

    let text_only = element
        .children
        .iter()
        .all(|child| matches!(child, Node::Text(_)));
    if text_only {
        out.push('>');
        out.push_str(&escape(&element.text(), false));
        close_tag(out, &element.name);
        return;
    }

    out.push_str(">\n");
    // Apple writes the top-level dict flush with <plist>
    let child_depth = if depth == 0 && element.is("plist") {
        0
    } else {
        depth + 1
    };
    for child in &element.children {
        match child {
            Node::Element(child) => write_element(out, child, child_depth),
            Node::Text(text) => {
                indent(out, child_depth);
                out.push_str(&escape(text.trim(), false));
                out.push('\n');
            }
            Node::Comment(comment) => {
                indent(out, child_depth);
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->\n");
            }
        }
    }
    indent(out, depth);
    close_tag(out, &element.name);
}

fn close_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push_str(">\n");
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleName</key>
    <string>App &amp; Co</string>

    <key>UIBackgroundModes</key>
    <array>
        <string>fetch</string>
    </array>
    <!-- keep me -->
    <key>Empty</key>
    <array/>
</dict>
</plist>
"#;

    #[test]
    fn test_parse_strips_blank_text() {
        let doc = PlistDocument::parse(SAMPLE).unwrap();
        let dict = doc.dict().unwrap();
        assert!(dict
            .children
            .iter()
            .all(|child| !matches!(child, Node::Text(_))));
        assert_eq!(dict.elements().count(), 6);
    }

    #[test]
    fn test_doctype_preserved() {
        let doc = PlistDocument::parse(SAMPLE).unwrap();
        assert_eq!(
            doc.doctype(),
            Some(r#"<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#)
        );
        assert!(doc.to_xml().contains("<!DOCTYPE plist PUBLIC"));
    }

    #[test]
    fn test_serialize_apple_layout() {
        let doc = PlistDocument::parse(SAMPLE).unwrap();
        let xml = doc.to_xml();
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains("<plist version=\"1.0\">\n<dict>\n\t<key>CFBundleName</key>\n"));
        assert!(xml.contains("\t<string>App &amp; Co</string>\n"));
        assert!(xml.contains("\t<array>\n\t\t<string>fetch</string>\n\t</array>\n"));
        assert!(xml.contains("\t<!-- keep me -->\n"));
        assert!(xml.contains("\t<array/>\n"));
    }

    #[test]
    fn test_serialize_is_stable() {
        let first = PlistDocument::parse(SAMPLE).unwrap().to_xml();
        let second = PlistDocument::parse(&first).unwrap().to_xml();
        assert_eq!(first, second);
    }

    #[test]
    fn test_whitespace_only_string_kept() {
        let doc = PlistDocument::parse("<plist><dict><key>k</key><string> </string></dict></plist>")
            .unwrap();
        let value = doc.dict().unwrap().elements().nth(1).unwrap();
        assert_eq!(value.text(), " ");
    }

    #[test]
    fn test_parse_error_reported() {
        assert!(PlistDocument::parse("<plist><dict></plist>").is_err());
    }

    #[test]
    fn test_dict_without_plist_wrapper() {
        let doc = PlistDocument::parse("<dict><key>a</key><string>b</string></dict>").unwrap();
        assert!(doc.dict().is_some());
        assert_eq!(
            doc.to_xml(),
            format!("{}\n<dict>\n\t<key>a</key>\n\t<string>b</string>\n</dict>\n", XML_DECLARATION)
        );
    }
}
