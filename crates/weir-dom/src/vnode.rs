//! Concrete virtual tree: the input of the diff/patch engine.
//!
//! A `VNode` is fully present: no position is waiting on anything
//! asynchronous. Thunks and widgets survive as leaves; the patch engine
//! materializes thunks via [`Thunk::render`] and drives the widget
//! lifecycle via [`Widget::init`] / [`Widget::update`].

use std::rc::Rc;

use indexmap::IndexMap;

use crate::document::{Document, NodeRef};

/// Element attributes, iterated in insertion order.
pub type Attrs = IndexMap<String, String>;

/// A concrete virtual node.
#[derive(Clone)]
pub enum VNode {
    Element(VElement),
    Text(String),
    Thunk(Rc<dyn Thunk>),
    Widget(Rc<dyn Widget>),
}

/// A concrete virtual element: tag, scalar attributes, ordered children.
#[derive(Clone)]
pub struct VElement {
    pub tag: String,
    pub attrs: Attrs,
    pub children: Vec<VNode>,
}

impl VElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attrs::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }
}

impl VNode {
    pub fn text(data: impl Into<String>) -> Self {
        VNode::Text(data.into())
    }

    pub fn thunk(thunk: impl Thunk + 'static) -> Self {
        VNode::Thunk(Rc::new(thunk))
    }

    pub fn widget(widget: impl Widget + 'static) -> Self {
        VNode::Widget(Rc::new(widget))
    }

    pub fn as_element(&self) -> Option<&VElement> {
        match self {
            VNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            VNode::Text(data) => Some(data),
            _ => None,
        }
    }
}

impl From<VElement> for VNode {
    fn from(element: VElement) -> Self {
        VNode::Element(element)
    }
}

impl From<&str> for VNode {
    fn from(data: &str) -> Self {
        VNode::Text(data.to_owned())
    }
}

impl From<String> for VNode {
    fn from(data: String) -> Self {
        VNode::Text(data)
    }
}

impl std::fmt::Debug for VNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VNode::Element(element) => f
                .debug_struct("VElement")
                .field("tag", &element.tag)
                .field("attrs", &element.attrs)
                .field("children", &element.children)
                .finish(),
            VNode::Text(data) => write!(f, "Text({data:?})"),
            VNode::Thunk(_) => write!(f, "Thunk"),
            VNode::Widget(widget) => write!(f, "Widget({})", widget.kind()),
        }
    }
}

/// A lazily rendered subtree.
///
/// The patch engine calls `render` with the previously materialized value at
/// the same structural position (`None` on first appearance); "previous" is
/// passed by value, no reference cycle is involved.
pub trait Thunk {
    fn render(&self, previous: Option<&VNode>) -> VNode;
}

/// A leaf that owns its live node outright.
///
/// `init` runs on first appearance and returns the node; `update` runs on
/// later appearances of a widget of the same [`Widget::kind`] and may
/// mutate the node in place; doing nothing leaves the node untouched.
/// Widgets of different kinds replace each other wholesale.
pub trait Widget {
    fn kind(&self) -> &'static str {
        "widget"
    }

    fn init(&self, document: &Document) -> NodeRef;

    fn update(&self, _previous: &dyn Widget, _node: &NodeRef) {}
}
