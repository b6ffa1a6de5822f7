//! Exclusive XML canonicalization 1.0, without comments.
//!
//! The parsed tree is first written out as a standalone document: the
//! excluded subtree is dropped and each element declares exactly the
//! namespaces exclusive canonicalization renders on it, so inherited
//! context and `InclusiveNamespaces` are settled here. `xml_canonicalization`
//! then produces the canonical text form of that document.

use std::collections::BTreeMap;

use xml_canonicalization::Canonicalizer;

use crate::document::{Element, Node};
use crate::error::{MetadataError, MetadataResult};

/// Prefix to URI bindings; `None` is the default namespace.
pub(crate) type NamespaceScope = BTreeMap<Option<String>, String>;

/// Returns the bindings in scope for a child of the last element in `ancestors`.
pub(crate) fn scope_of(ancestors: &[&Element]) -> NamespaceScope {
    let mut scope = NamespaceScope::new();
    for element in ancestors {
        for (prefix, uri) in &element.namespace_decls {
            scope.insert(prefix.clone(), uri.clone());
        }
    }
    scope
}

/// Parses an `InclusiveNamespaces/@PrefixList` value.
pub(crate) fn inclusive_prefixes(prefix_list: &str) -> Vec<Option<String>> {
    prefix_list
        .split_whitespace()
        .map(|token| match token {
            "#default" => None,
            prefix => Some(prefix.to_string()),
        })
        .collect()
}

/// Canonicalizes `element` and its subtree.
///
/// `inherited` holds the bindings in scope at `element`'s parent. `excluded`
/// is skipped by identity, which is how the enveloped-signature transform
/// removes the signature from the signed content.
///
/// ## Errors
///
/// Returns [`MetadataError::SignatureInvalid`] when the subtree cannot be
/// canonicalized.
pub(crate) fn canonicalize(
    element: &Element,
    inherited: &NamespaceScope,
    inclusive: &[Option<String>],
    excluded: Option<&Element>,
) -> MetadataResult<String> {
    let mut standalone = String::new();
    let writer = Writer {
        inclusive,
        excluded,
    };
    writer.element(element, inherited, &NamespaceScope::new(), &mut standalone);

    let mut output = Vec::new();
    Canonicalizer::read_from_str(&standalone)
        .write_to_writer(&mut output)
        .canonicalize(false)
        .map_err(|e| MetadataError::signature(format!("canonicalization failed: {e}")))?;
    String::from_utf8(output)
        .map_err(|e| MetadataError::signature(format!("canonical form is not UTF-8: {e}")))
}

struct Writer<'a> {
    inclusive: &'a [Option<String>],
    excluded: Option<&'a Element>,
}

impl Writer<'_> {
    fn element(
        &self,
        element: &Element,
        inherited: &NamespaceScope,
        rendered: &NamespaceScope,
        out: &mut String,
    ) {
        let mut scope = inherited.clone();
        for (prefix, uri) in &element.namespace_decls {
            scope.insert(prefix.clone(), uri.clone());
        }

        let mut utilized: Vec<Option<String>> = vec![element.prefix.clone()];
        utilized.extend(
            element
                .attributes
                .iter()
                .filter_map(|a| a.prefix.clone())
                .map(Some),
        );
        utilized.extend(
            self.inclusive
                .iter()
                .filter(|p| p.is_none() || scope.contains_key(*p))
                .cloned(),
        );

        let mut output = NamespaceScope::new();
        for prefix in utilized {
            if prefix.as_deref() == Some("xml") {
                continue;
            }
            let uri = scope.get(&prefix).cloned().unwrap_or_default();
            let already = rendered.get(&prefix).map(String::as_str).unwrap_or_default();
            if already != uri {
                output.insert(prefix, uri);
            }
        }

        out.push('<');
        out.push_str(&element.qualified_name());
        for (prefix, uri) in &output {
            match prefix {
                Some(prefix) => {
                    out.push_str(" xmlns:");
                    out.push_str(prefix);
                }
                None => out.push_str(" xmlns"),
            }
            out.push_str("=\"");
            escape_attribute(uri, out);
            out.push('"');
        }

        for attribute in &element.attributes {
            out.push(' ');
            out.push_str(&attribute.qualified_name());
            out.push_str("=\"");
            escape_attribute(&attribute.value, out);
            out.push('"');
        }
        out.push('>');

        let mut now_rendered = rendered.clone();
        now_rendered.extend(output);

        for child in &element.children {
            match child {
                Node::Text(text) => escape_text(text, out),
                Node::Element(child) => {
                    if self.excluded.is_some_and(|e| std::ptr::eq(e, child)) {
                        continue;
                    }
                    self.element(child, &scope, &now_rendered, out);
                }
            }
        }

        out.push_str("</");
        out.push_str(&element.qualified_name());
        out.push('>');
    }
}

// Whitespace and carriage returns are written as character references so
// the canonicalizer's parser sees the values the tree holds.
fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}
