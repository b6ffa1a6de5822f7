//! Namespace-aware XML document tree.
//!
//! The tree keeps what the sync engine navigates by (resolved element and
//! attribute names, text) and what signature verification needs to
//! re-serialize the document (prefixes, namespace declarations, text nodes in
//! document order).

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{MetadataError, MetadataResult};
use crate::namespaces;

/// A parsed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    root: Element,
}

/// A namespace declaration: `(prefix, uri)`, where `None` is the default namespace.
pub(crate) type NamespaceDecl = (Option<String>, String);

/// An element node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub(crate) prefix: Option<String>,
    pub(crate) local_name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) namespace_decls: Vec<NamespaceDecl>,
    pub(crate) attributes: Vec<XmlAttribute>,
    pub(crate) children: Vec<Node>,
}

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A nested element.
    Element(Element),
    /// Character data, unescaped.
    Text(String),
}

/// An attribute (namespace declarations excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub(crate) prefix: Option<String>,
    pub(crate) local_name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) value: String,
}

impl XmlAttribute {
    /// Returns the local name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Returns the namespace URI, if the attribute is prefixed.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the unescaped value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn qualified_name(&self) -> String {
        qualified(self.prefix.as_deref(), &self.local_name)
    }
}

pub(crate) fn qualified(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local_name}"),
        None => local_name.to_string(),
    }
}

impl DocumentTree {
    /// Parses a document.
    ///
    /// ## Errors
    ///
    /// Returns [`MetadataError::Parse`] for malformed XML or unbound prefixes.
    pub fn parse(xml: &str) -> MetadataResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut builder = TreeBuilder::default();

        loop {
            match reader.read_event().map_err(|e| {
                MetadataError::parse(format!("at byte {}: {e}", reader.buffer_position()))
            })? {
                Event::Start(start) => {
                    let element = builder.open(&start)?;
                    builder.stack.push(element);
                }
                Event::Empty(start) => {
                    let element = builder.open(&start)?;
                    builder.scopes.pop();
                    builder.attach(element)?;
                }
                Event::End(_) => {
                    let element = builder
                        .stack
                        .pop()
                        .ok_or_else(|| MetadataError::parse("unbalanced end tag"))?;
                    builder.scopes.pop();
                    builder.attach(element)?;
                }
                Event::Text(text) => {
                    let raw = std::str::from_utf8(&text).map_err(MetadataError::parse)?;
                    let normalized = normalize_line_ends(raw);
                    let text = unescape(&normalized).map_err(MetadataError::parse)?;
                    builder.text(&text);
                }
                Event::CData(data) => {
                    let text = String::from_utf8(data.into_inner().into_owned())
                        .map_err(MetadataError::parse)?;
                    builder.text(&text);
                }
                Event::Eof => break,
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }

        if !builder.stack.is_empty() {
            return Err(MetadataError::parse("unexpected end of document"));
        }
        builder
            .root
            .map(|root| Self { root })
            .ok_or_else(|| MetadataError::parse("document has no root element"))
    }

    /// Returns the root element.
    #[must_use]
    pub const fn root(&self) -> &Element {
        &self.root
    }

    /// Returns every element named `{namespace}local_name`, in document order.
    #[must_use]
    pub fn descendants(&self, namespace: &str, local_name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        collect_descendants(&self.root, namespace, local_name, &mut found);
        found
    }
}

fn collect_descendants<'a>(
    element: &'a Element,
    namespace: &str,
    local_name: &str,
    found: &mut Vec<&'a Element>,
) {
    if element.is(namespace, local_name) {
        found.push(element);
    }
    for child in element.children() {
        collect_descendants(child, namespace, local_name, found);
    }
}

impl Element {
    /// Returns the local name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Returns the namespace URI.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns true when the element is `{namespace}local_name`.
    #[must_use]
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Returns an unprefixed attribute's value.
    #[must_use]
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(XmlAttribute::value)
    }

    /// Returns a namespaced attribute's value.
    #[must_use]
    pub fn attribute_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.local_name == local_name)
            .map(XmlAttribute::value)
    }

    /// Returns the `xml:lang` attribute.
    #[must_use]
    pub fn lang(&self) -> Option<&str> {
        self.attribute_ns(namespaces::XML, "lang")
    }

    /// Returns the attributes.
    #[must_use]
    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    /// Returns the child elements.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Returns the child elements named `{namespace}local_name`.
    pub fn children_named<'a, 'n>(
        &'a self,
        namespace: &'n str,
        local_name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + 'n
    where
        'a: 'n,
    {
        self.children().filter(move |c| c.is(namespace, local_name))
    }

    /// Returns the first child element named `{namespace}local_name`.
    #[must_use]
    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&Element> {
        self.children().find(|c| c.is(namespace, local_name))
    }

    /// Follows a path of child steps, taking the first match at each step.
    #[must_use]
    pub fn find(&self, path: &[(&str, &str)]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |element, (namespace, local_name)| {
                element.child(namespace, local_name)
            })
    }

    /// Follows a path of child steps, collecting every match of the last step.
    #[must_use]
    pub fn find_all(&self, path: &[(&str, &str)]) -> Vec<&Element> {
        let mut current = vec![self];
        for (namespace, local_name) in path {
            current = current
                .into_iter()
                .flat_map(|element| {
                    element
                        .children()
                        .filter(move |c| c.is(namespace, local_name))
                })
                .collect();
        }
        current
    }

    /// Returns the element's own text content, trimmed.
    #[must_use]
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                text.push_str(t);
            }
        }
        text.trim().to_string()
    }

    pub(crate) fn qualified_name(&self) -> String {
        qualified(self.prefix.as_deref(), &self.local_name)
    }
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Element>,
    scopes: Vec<Vec<NamespaceDecl>>,
    root: Option<Element>,
}

impl TreeBuilder {
    /// Builds an element from a start tag and pushes its namespace scope.
    fn open(&mut self, start: &BytesStart<'_>) -> MetadataResult<Element> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(MetadataError::parse)?
            .to_string();
        let (prefix, local_name) = split_name(&name);

        let mut namespace_decls = Vec::new();
        let mut raw_attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(MetadataError::parse)?;
            let key = std::str::from_utf8(attribute.key.as_ref())
                .map_err(MetadataError::parse)?
                .to_string();
            let raw = std::str::from_utf8(&attribute.value).map_err(MetadataError::parse)?;
            let value = unescape(&normalize_attribute_whitespace(raw))
                .map_err(MetadataError::parse)?
                .into_owned();

            if key == "xmlns" {
                namespace_decls.push((None, value));
            } else if let Some(declared) = key.strip_prefix("xmlns:") {
                namespace_decls.push((Some(declared.to_string()), value));
            } else {
                raw_attributes.push((key, value));
            }
        }
        self.scopes.push(namespace_decls.clone());

        let namespace = self.resolve(prefix.as_deref())?;
        let mut attributes = Vec::with_capacity(raw_attributes.len());
        for (key, value) in raw_attributes {
            let (prefix, local_name) = split_name(&key);
            // unprefixed attributes are in no namespace
            let namespace = match prefix.as_deref() {
                Some(p) => self.resolve(Some(p))?,
                None => None,
            };
            attributes.push(XmlAttribute {
                prefix,
                local_name,
                namespace,
                value,
            });
        }

        Ok(Element {
            prefix,
            local_name,
            namespace,
            namespace_decls,
            attributes,
            children: Vec::new(),
        })
    }

    fn resolve(&self, prefix: Option<&str>) -> MetadataResult<Option<String>> {
        if prefix == Some("xml") {
            return Ok(Some(namespaces::XML.to_string()));
        }
        for frame in self.scopes.iter().rev() {
            if let Some((_, uri)) = frame.iter().find(|(p, _)| p.as_deref() == prefix) {
                return Ok(if uri.is_empty() { None } else { Some(uri.clone()) });
            }
        }
        match prefix {
            Some(prefix) => Err(MetadataError::parse(format!("unbound prefix '{prefix}'"))),
            None => Ok(None),
        }
    }

    fn attach(&mut self, element: Element) -> MetadataResult<()> {
        match self.stack.last_mut() {
            Some(parent) => {
                parent.children.push(Node::Element(element));
                Ok(())
            }
            None if self.root.is_none() => {
                self.root = Some(element);
                Ok(())
            }
            None => Err(MetadataError::parse("multiple root elements")),
        }
    }

    fn text(&mut self, text: &str) {
        // text outside the root element is insignificant
        if let Some(parent) = self.stack.last_mut() {
            if let Some(Node::Text(existing)) = parent.children.last_mut() {
                existing.push_str(text);
            } else {
                parent.children.push(Node::Text(text.to_string()));
            }
        }
    }
}

/// Line-end handling every XML processor applies before character data is seen.
fn normalize_line_ends(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// Attribute value normalization for CDATA-typed attributes. Character
/// references are expanded afterwards, so `&#10;` survives as a line feed.
fn normalize_attribute_whitespace(raw: &str) -> String {
    normalize_line_ends(raw).replace(['\n', '\t'], " ")
}

fn split_name(name: &str) -> (Option<String>, String) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, name.to_string()),
    }
}
