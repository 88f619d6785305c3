//! Driver facade: target validation, configuration, wiring.

use std::cell::RefCell;
use std::rc::Rc;

use futures::stream::Stream;
use thiserror::Error;

use weir_dom::{parse_scope, Document, NodeRef};

use crate::render::{render_loop, ErrorHandler};
use crate::select::{match_chain, DomSource, Registry};
use crate::task::Task;
use crate::tree::{DynError, NodeStream, TreeResult};

/// Where the driver renders: a live node, or a selector string resolved
/// against the document at setup time.
pub enum RenderTarget {
    Node(NodeRef),
    Selector(String),
}

impl From<NodeRef> for RenderTarget {
    fn from(node: NodeRef) -> Self {
        RenderTarget::Node(node)
    }
}

impl From<&NodeRef> for RenderTarget {
    fn from(node: &NodeRef) -> Self {
        RenderTarget::Node(node.clone())
    }
}

impl From<&str> for RenderTarget {
    fn from(selector: &str) -> Self {
        RenderTarget::Selector(selector.to_owned())
    }
}

impl From<String> for RenderTarget {
    fn from(selector: String) -> Self {
        RenderTarget::Selector(selector)
    }
}

/// Setup failures, raised synchronously at driver-creation time and never
/// retried.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A selector target matched nothing in the document.
    #[error("cannot render into unknown element `{0}`")]
    UnknownTarget(String),
    /// The target is neither an element, a fragment, nor a selector string.
    #[error("given container is neither a document element nor a selector string")]
    InvalidTarget,
}

/// Driver configuration. Without an error handler, a failing tree stream is
/// fatal to the render task.
#[derive(Default)]
pub struct DriverConfig {
    on_error: Option<ErrorHandler>,
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route tree-stream failures to `handler` instead of dying.
    pub fn on_error(mut self, handler: impl Fn(DynError) + 'static) -> Self {
        self.on_error = Some(Rc::new(handler));
        self
    }
}

/// Validate the render target and build a driver for it.
///
/// Accepts a live element, a fragment, or a selector string resolving to an
/// existing element (first match in document order). Anything else is a
/// [`SetupError`].
pub fn make_dom_driver(
    document: &Document,
    target: impl Into<RenderTarget>,
    config: DriverConfig,
) -> Result<DomDriver, SetupError> {
    let container = resolve_target(document, target.into())?;
    Ok(DomDriver {
        document: document.clone(),
        container,
        config,
    })
}

fn resolve_target(document: &Document, target: RenderTarget) -> Result<NodeRef, SetupError> {
    match target {
        RenderTarget::Node(node) if node.is_element() || node.is_fragment() => Ok(node),
        RenderTarget::Node(_) => Err(SetupError::InvalidTarget),
        RenderTarget::Selector(selector) => {
            let chain = parse_scope(&selector);
            if chain.is_empty() {
                return Err(SetupError::UnknownTarget(selector));
            }
            match_chain(&document.root(), &chain)
                .into_iter()
                .next()
                .ok_or(SetupError::UnknownTarget(selector))
        }
    }
}

/// A validated driver, ready to attach a tree stream to its container.
pub struct DomDriver {
    document: Document,
    container: NodeRef,
    config: DriverConfig,
}

impl DomDriver {
    pub fn container(&self) -> NodeRef {
        self.container.clone()
    }

    /// Start the render session. Consumes the driver: exactly one render
    /// loop attaches per container.
    pub fn attach<S>(self, trees: S) -> DomSource
    where
        S: Stream<Item = TreeResult> + 'static,
    {
        let state = Rc::new(RefCell::new(Registry::new(self.container.clone())));
        let task = Task::start_droppable(render_loop(
            self.document,
            self.container,
            NodeStream::new(trees),
            state.clone(),
            self.config.on_error,
        ));
        state.borrow_mut().render_task = Some(task);
        DomSource::new(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_target_takes_first_match_in_document_order() {
        let document = Document::new();
        let first = document.create_element("div");
        first.set_attribute("class", "app");
        let second = document.create_element("div");
        second.set_attribute("class", "app");
        document.root().append_child(&first);
        document.root().append_child(&second);

        let driver = make_dom_driver(&document, ".app", DriverConfig::new()).unwrap();
        assert_eq!(driver.container(), first);
    }

    #[test]
    fn empty_selector_is_rejected() {
        let document = Document::new();
        assert!(matches!(
            make_dom_driver(&document, "", DriverConfig::new()),
            Err(SetupError::UnknownTarget(_))
        ));
    }
}
