//! Headless live document tree.
//!
//! This is the mutable tree the driver patches: single-threaded nodes behind
//! `Rc<RefCell>` with weak parent links, HTML/SVG namespaces, and a
//! document-wide mutation counter. The counter ticks on every structural,
//! attribute or text mutation, which is what lets callers observe that an
//! identical re-render touched nothing.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use ulid::Ulid;

use crate::event::RegisteredListener;

/// Namespace an element node lives in.
///
/// SVG subtrees are created and patched in the SVG namespace; the namespace
/// is decided by the ancestor context at creation time, keyed by the `svg`
/// tag, never by tag name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Html,
    Svg,
}

/// Shared counter of document mutations.
///
/// Every node of a document holds a clone; structural, attribute and text
/// mutations bump it. Reads are cheap, so tests and diagnostics can assert
/// "this operation did not touch the tree".
#[derive(Clone, Default)]
pub struct MutationCounter(Rc<Cell<u64>>);

impl MutationCounter {
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    pub(crate) fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }
}

pub(crate) enum NodeKind {
    Element {
        tag: String,
        namespace: Namespace,
        attributes: IndexMap<String, String>,
    },
    Text {
        data: String,
    },
    Fragment,
}

pub(crate) struct NodeData {
    pub(crate) id: Ulid,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Weak<RefCell<NodeData>>,
    pub(crate) children: Vec<NodeRef>,
    pub(crate) listeners: Vec<RegisteredListener>,
    pub(crate) mutations: MutationCounter,
}

/// Cheap handle to one live node. Identity is node identity: two `NodeRef`s
/// are equal iff they point at the same node.
#[derive(Clone)]
pub struct NodeRef {
    pub(crate) data: Rc<RefCell<NodeData>>,
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for NodeRef {}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.borrow();
        match &data.kind {
            NodeKind::Element { tag, .. } => write!(f, "NodeRef(<{tag}> {})", data.id),
            NodeKind::Text { data: text } => write!(f, "NodeRef({text:?} {})", data.id),
            NodeKind::Fragment => write!(f, "NodeRef(#fragment {})", data.id),
        }
    }
}

/// A headless document: node factory plus the tree root the nodes hang off.
///
/// The root is a fragment node standing in for the host document; render
/// targets are appended under it the same way a browser test appends its
/// container under `document.body`.
#[derive(Clone)]
pub struct Document {
    mutations: MutationCounter,
    root: NodeRef,
}

impl Document {
    pub fn new() -> Self {
        let mutations = MutationCounter::default();
        let root = NodeRef::new(NodeKind::Fragment, mutations.clone());
        Self { mutations, root }
    }

    /// The document root. Everything queryable lives under it.
    pub fn root(&self) -> NodeRef {
        self.root.clone()
    }

    /// Create a detached element. The namespace is SVG for the `svg` tag
    /// itself, HTML otherwise; use [`Document::create_element_ns`] when the
    /// ancestor context dictates the namespace.
    pub fn create_element(&self, tag: &str) -> NodeRef {
        let namespace = if tag.eq_ignore_ascii_case("svg") {
            Namespace::Svg
        } else {
            Namespace::Html
        };
        self.create_element_ns(namespace, tag)
    }

    pub fn create_element_ns(&self, namespace: Namespace, tag: &str) -> NodeRef {
        NodeRef::new(
            NodeKind::Element {
                tag: tag.to_owned(),
                namespace,
                attributes: IndexMap::new(),
            },
            self.mutations.clone(),
        )
    }

    pub fn create_text(&self, data: &str) -> NodeRef {
        NodeRef::new(
            NodeKind::Text {
                data: data.to_owned(),
            },
            self.mutations.clone(),
        )
    }

    /// Create a detached fragment, usable as a render target in its own
    /// right (the headless counterpart of a `DocumentFragment`).
    pub fn create_fragment(&self) -> NodeRef {
        NodeRef::new(NodeKind::Fragment, self.mutations.clone())
    }

    /// Total number of tree mutations since the document was created.
    pub fn mutations(&self) -> u64 {
        self.mutations.get()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRef {
    fn new(kind: NodeKind, mutations: MutationCounter) -> Self {
        Self {
            data: Rc::new(RefCell::new(NodeData {
                id: Ulid::new(),
                kind,
                parent: Weak::new(),
                children: Vec::new(),
                listeners: Vec::new(),
                mutations,
            })),
        }
    }

    /// Stable node id, used in trace output.
    pub fn id(&self) -> Ulid {
        self.data.borrow().id
    }

    pub fn is_element(&self) -> bool {
        matches!(self.data.borrow().kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data.borrow().kind, NodeKind::Text { .. })
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.data.borrow().kind, NodeKind::Fragment)
    }

    pub fn tag(&self) -> Option<String> {
        match &self.data.borrow().kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn namespace(&self) -> Option<Namespace> {
        match &self.data.borrow().kind {
            NodeKind::Element { namespace, .. } => Some(*namespace),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.data.borrow().parent.upgrade().map(|data| NodeRef { data })
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.data.borrow().children.clone()
    }

    pub fn child(&self, index: usize) -> Option<NodeRef> {
        self.data.borrow().children.get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.data.borrow().children.len()
    }

    /// True when `other` is `self` or lies anywhere under it.
    pub fn contains(&self, other: &NodeRef) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node == *self {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Append `child`, detaching it from any previous parent first.
    pub fn append_child(&self, child: &NodeRef) {
        self.insert_child(self.child_count(), child);
    }

    pub fn insert_child(&self, index: usize, child: &NodeRef) {
        child.detach();
        {
            let mut data = self.data.borrow_mut();
            let index = index.min(data.children.len());
            data.children.insert(index, child.clone());
        }
        child.data.borrow_mut().parent = Rc::downgrade(&self.data);
        self.counter().bump();
    }

    /// Remove the child at `index`, returning it detached.
    pub fn remove_child(&self, index: usize) -> Option<NodeRef> {
        let child = {
            let mut data = self.data.borrow_mut();
            if index >= data.children.len() {
                return None;
            }
            data.children.remove(index)
        };
        child.data.borrow_mut().parent = Weak::new();
        self.counter().bump();
        Some(child)
    }

    /// Swap `old` for `new` in place. Returns false when `old` is not a
    /// child of this node.
    pub fn replace_child(&self, old: &NodeRef, new: &NodeRef) -> bool {
        let index = {
            let data = self.data.borrow();
            match data.children.iter().position(|child| child == old) {
                Some(index) => index,
                None => return false,
            }
        };
        new.detach();
        {
            let mut data = self.data.borrow_mut();
            data.children[index] = new.clone();
        }
        old.data.borrow_mut().parent = Weak::new();
        new.data.borrow_mut().parent = Rc::downgrade(&self.data);
        self.counter().bump();
        true
    }

    /// Remove this node from its parent, if any.
    pub fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        let index = {
            let data = parent.data.borrow();
            data.children.iter().position(|child| child == self)
        };
        if let Some(index) = index {
            parent.data.borrow_mut().children.remove(index);
            self.data.borrow_mut().parent = Weak::new();
            self.counter().bump();
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.data.borrow().kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).cloned(),
            _ => None,
        }
    }

    pub fn attribute_names(&self) -> Vec<String> {
        match &self.data.borrow().kind {
            NodeKind::Element { attributes, .. } => attributes.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Set an attribute; a write of the already-present value is a no-op and
    /// does not count as a mutation.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let changed = match &mut self.data.borrow_mut().kind {
            NodeKind::Element { attributes, .. } => {
                if attributes.get(name).map(String::as_str) == Some(value) {
                    false
                } else {
                    attributes.insert(name.to_owned(), value.to_owned());
                    true
                }
            }
            _ => false,
        };
        if changed {
            self.counter().bump();
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        let changed = match &mut self.data.borrow_mut().kind {
            NodeKind::Element { attributes, .. } => attributes.shift_remove(name).is_some(),
            _ => false,
        };
        if changed {
            self.counter().bump();
        }
    }

    pub fn class_name(&self) -> Option<String> {
        self.attribute("class")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Text-node data; `None` for elements and fragments.
    pub fn text(&self) -> Option<String> {
        match &self.data.borrow().kind {
            NodeKind::Text { data } => Some(data.clone()),
            _ => None,
        }
    }

    /// Overwrite text-node data; no-op (and no mutation) when unchanged.
    pub fn set_text(&self, text: &str) {
        let changed = match &mut self.data.borrow_mut().kind {
            NodeKind::Text { data } => {
                if data == text {
                    false
                } else {
                    *data = text.to_owned();
                    true
                }
            }
            _ => false,
        };
        if changed {
            self.counter().bump();
        }
    }

    /// Concatenated text of this node and everything under it.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = self.text() {
            out.push_str(&text);
            return;
        }
        for child in self.children() {
            child.collect_text(out);
        }
    }

    /// Render this subtree as HTML, for assertions and diagnostics.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let tag = {
            let data = self.data.borrow();
            match &data.kind {
                NodeKind::Text { data } => {
                    out.push_str(data);
                    return;
                }
                NodeKind::Fragment => None,
                NodeKind::Element { tag, attributes, .. } => {
                    let _ = write!(out, "<{tag}");
                    for (name, value) in attributes {
                        let _ = write!(out, " {name}=\"{value}\"");
                    }
                    out.push('>');
                    Some(tag.clone())
                }
            }
        };
        for child in self.children() {
            child.write_html(out);
        }
        if let Some(tag) = tag {
            let _ = write!(out, "</{tag}>");
        }
    }

    pub(crate) fn counter(&self) -> MutationCounter {
        self.data.borrow().mutations.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_detach_maintain_parent_links() {
        let document = Document::new();
        let parent = document.create_element("div");
        let child = document.create_element("span");

        parent.append_child(&child);
        assert_eq!(child.parent(), Some(parent.clone()));
        assert_eq!(parent.child_count(), 1);

        child.detach();
        assert_eq!(child.parent(), None);
        assert_eq!(parent.child_count(), 0);
    }

    #[test]
    fn append_moves_node_between_parents() {
        let document = Document::new();
        let a = document.create_element("div");
        let b = document.create_element("div");
        let child = document.create_text("x");

        a.append_child(&child);
        b.append_child(&child);

        assert_eq!(a.child_count(), 0);
        assert_eq!(child.parent(), Some(b));
    }

    #[test]
    fn replace_child_swaps_in_place() {
        let document = Document::new();
        let parent = document.create_element("div");
        let old = document.create_element("p");
        let middle = document.create_element("em");
        let new = document.create_element("span");
        parent.append_child(&old);
        parent.append_child(&middle);

        assert!(parent.replace_child(&old, &new));
        assert_eq!(parent.child(0), Some(new));
        assert_eq!(old.parent(), None);
        assert!(!parent.replace_child(&old, &middle));
    }

    #[test]
    fn text_content_concatenates_subtree() {
        let document = Document::new();
        let div = document.create_element("div");
        let p = document.create_element("p");
        p.append_child(&document.create_text("Foo"));
        div.append_child(&p);
        div.append_child(&document.create_text("Bar"));

        assert_eq!(div.text_content(), "FooBar");
    }

    #[test]
    fn identical_attribute_write_is_not_a_mutation() {
        let document = Document::new();
        let div = document.create_element("div");
        div.set_attribute("class", "foo");
        let before = document.mutations();

        div.set_attribute("class", "foo");
        assert_eq!(document.mutations(), before);

        div.set_attribute("class", "bar");
        assert_eq!(document.mutations(), before + 1);
    }

    #[test]
    fn contains_walks_ancestors() {
        let document = Document::new();
        let outer = document.create_element("div");
        let inner = document.create_element("span");
        let text = document.create_text("x");
        outer.append_child(&inner);
        inner.append_child(&text);

        assert!(outer.contains(&text));
        assert!(outer.contains(&outer));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn to_html_renders_tags_attributes_and_text() {
        let document = Document::new();
        let div = document.create_element("div");
        div.set_attribute("class", "top-most");
        let p = document.create_element("p");
        p.append_child(&document.create_text("Foo"));
        div.append_child(&p);

        assert_eq!(div.to_html(), r#"<div class="top-most"><p>Foo</p></div>"#);
    }

    #[test]
    fn svg_tag_defaults_to_svg_namespace() {
        let document = Document::new();
        assert_eq!(document.create_element("svg").namespace(), Some(Namespace::Svg));
        assert_eq!(document.create_element("div").namespace(), Some(Namespace::Html));
    }
}
