//! Compound selector parsing and scoped queries.
//!
//! The scope grammar is deliberately small: a compound of simple selectors
//! (`tag`, `.class`, `#id`, combined as `tag.class#id`), with whitespace
//! inside one scope string acting as a descendant chain. Parsing never
//! fails; a scope that cannot match anything simply matches nothing.

use crate::document::NodeRef;

/// One compound simple selector: optional tag, optional id, any number of
/// classes. All present parts must hold for an element to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl Compound {
    /// Parse a single compound selector such as `div.foo#bar.baz`.
    pub fn parse(scope: &str) -> Self {
        let mut compound = Compound::default();
        let mut rest = scope.trim();
        while !rest.is_empty() {
            let (marker, tail) = match rest.as_bytes()[0] {
                b'.' => (Marker::Class, &rest[1..]),
                b'#' => (Marker::Id, &rest[1..]),
                _ => (Marker::Tag, rest),
            };
            let end = tail
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
                .unwrap_or(tail.len());
            let (name, remaining) = tail.split_at(end);
            if !name.is_empty() {
                match marker {
                    Marker::Tag => compound.tag = Some(name.to_owned()),
                    Marker::Id => compound.id = Some(name.to_owned()),
                    Marker::Class => compound.classes.push(name.to_owned()),
                }
            }
            if remaining.len() == tail.len() && marker == Marker::Tag {
                // Unrecognized leading character; skip it rather than loop.
                rest = &rest[rest.chars().next().map_or(1, char::len_utf8)..];
            } else {
                rest = remaining;
            }
        }
        compound
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty()
    }
}

#[derive(PartialEq, Clone, Copy)]
enum Marker {
    Tag,
    Id,
    Class,
}

/// Parse one scope string into a descendant chain of compounds:
/// `".foo .bar"` behaves like selecting `.foo` and then `.bar` inside it.
pub fn parse_scope(scope: &str) -> Vec<Compound> {
    scope.split_whitespace().map(Compound::parse).collect()
}

/// Does this element match the compound? Text nodes and fragments never
/// match; an empty compound matches any element.
pub fn matches(node: &NodeRef, compound: &Compound) -> bool {
    if !node.is_element() {
        return false;
    }
    if let Some(tag) = &compound.tag {
        match node.tag() {
            Some(node_tag) if node_tag.eq_ignore_ascii_case(tag) => {}
            _ => return false,
        }
    }
    if let Some(id) = &compound.id {
        if node.attribute("id").as_deref() != Some(id.as_str()) {
            return false;
        }
    }
    compound.classes.iter().all(|class| node.has_class(class))
}

/// All strict descendants of `root` matching `compound`, in depth-first
/// document order.
pub fn query_all(root: &NodeRef, compound: &Compound) -> Vec<NodeRef> {
    let mut found = Vec::new();
    collect(root, compound, &mut found);
    found
}

fn collect(node: &NodeRef, compound: &Compound, found: &mut Vec<NodeRef>) {
    for child in node.children() {
        if matches(&child, compound) {
            found.push(child.clone());
        }
        collect(&child, compound, found);
    }
}
