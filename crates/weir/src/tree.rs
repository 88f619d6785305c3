//! Stream-carrying virtual tree: the driver's input value.
//!
//! A [`TreeNode`] is a closed union over the five node shapes. The `Stream`
//! variant wraps a stream of further tree nodes and may appear at any depth,
//! including as the root; the resolver collapses every such position into
//! the latest concrete value. Because a tree can own live subscriptions it
//! is consumed by resolution and is not `Clone`.

use std::rc::Rc;

use futures::stream::{LocalBoxStream, Stream, StreamExt};

use weir_dom::{Attrs, Thunk, VElement, VNode, Widget};

/// Failure carried through tree streams. Single-threaded by design, like
/// everything else in the driver.
pub type DynError = Box<dyn std::error::Error>;

/// Item type of every tree stream: the next tree, or the stream's failure.
pub type TreeResult = Result<TreeNode, DynError>;

/// A stream of tree nodes sitting at one structural position.
pub struct NodeStream(LocalBoxStream<'static, TreeResult>);

impl NodeStream {
    pub fn new(stream: impl Stream<Item = TreeResult> + 'static) -> Self {
        Self(stream.boxed_local())
    }

    /// Wrap an infallible stream of nodes.
    pub fn from_nodes<T>(stream: impl Stream<Item = T> + 'static) -> Self
    where
        T: Into<TreeNode>,
    {
        Self(stream.map(|node| Ok(node.into())).boxed_local())
    }

    pub(crate) fn into_inner(self) -> LocalBoxStream<'static, TreeResult> {
        self.0
    }
}

/// A virtual node that may still contain asynchronous positions.
pub enum TreeNode {
    Element(TreeElement),
    Text(String),
    Stream(NodeStream),
    Thunk(Rc<dyn Thunk>),
    Widget(Rc<dyn Widget>),
}

/// An element whose children may themselves be pending on streams.
pub struct TreeElement {
    pub tag: String,
    pub attrs: Attrs,
    pub children: Vec<TreeNode>,
}

impl TreeElement {
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

    pub fn child(mut self, child: impl Into<TreeNode>) -> Self {
        self.children.push(child.into());
        self
    }
}

impl TreeNode {
    pub fn text(data: impl Into<String>) -> Self {
        TreeNode::Text(data.into())
    }

    pub fn stream(stream: NodeStream) -> Self {
        TreeNode::Stream(stream)
    }

    pub fn thunk(thunk: impl Thunk + 'static) -> Self {
        TreeNode::Thunk(Rc::new(thunk))
    }

    pub fn widget(widget: impl Widget + 'static) -> Self {
        TreeNode::Widget(Rc::new(widget))
    }
}

impl From<TreeElement> for TreeNode {
    fn from(element: TreeElement) -> Self {
        TreeNode::Element(element)
    }
}

impl From<NodeStream> for TreeNode {
    fn from(stream: NodeStream) -> Self {
        TreeNode::Stream(stream)
    }
}

impl From<&str> for TreeNode {
    fn from(data: &str) -> Self {
        TreeNode::Text(data.to_owned())
    }
}

impl From<String> for TreeNode {
    fn from(data: String) -> Self {
        TreeNode::Text(data)
    }
}

/// Concrete trees embed wherever a tree node is expected.
impl From<VNode> for TreeNode {
    fn from(vnode: VNode) -> Self {
        match vnode {
            VNode::Element(element) => TreeNode::Element(TreeElement {
                tag: element.tag,
                attrs: element.attrs,
                children: element.children.into_iter().map(TreeNode::from).collect(),
            }),
            VNode::Text(data) => TreeNode::Text(data),
            VNode::Thunk(thunk) => TreeNode::Thunk(thunk),
            VNode::Widget(widget) => TreeNode::Widget(widget),
        }
    }
}

impl From<VElement> for TreeNode {
    fn from(element: VElement) -> Self {
        VNode::Element(element).into()
    }
}
