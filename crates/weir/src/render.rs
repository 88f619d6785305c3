//! The render loop: one task per container.
//!
//! The outer tree stream is wrapped as a root-level `Stream` node before
//! resolution, so "a stream of trees" and "a tree whose root is a stream"
//! are literally the same code path. Snapshots apply sequentially inside
//! one task, which is what makes patch application totally ordered and
//! never interleaved.

use std::cell::RefCell;
use std::rc::Rc;

use futures::StreamExt;
use tracing::{debug, error};

use weir_dom::{create_in, patch, Document, Namespace, NodeRef, VNode};

use crate::resolve::resolve;
use crate::select::{notify_patch, Registry};
use crate::tree::{DynError, NodeStream, TreeNode};

pub(crate) type ErrorHandler = Rc<dyn Fn(DynError)>;

pub(crate) async fn render_loop(
    document: Document,
    container: NodeRef,
    trees: NodeStream,
    state: Rc<RefCell<Registry>>,
    on_error: Option<ErrorHandler>,
) {
    let mut snapshots = resolve(TreeNode::Stream(trees));
    // The currently rendered tree: created on first application, replaced
    // per patch, gone when the loop (and with it the session) ends.
    let mut current: Option<(VNode, NodeRef)> = None;
    let mut sequence: u64 = 0;

    while let Some(item) = snapshots.next().await {
        match item {
            Ok(snapshot) => {
                current = Some(apply(&document, &container, current.take(), &snapshot));
                sequence += 1;
                debug!(sequence, container = %container.id(), "applied snapshot");
                notify_patch(&state);
            }
            Err(err) => {
                // The document keeps its last valid state either way.
                match on_error.as_ref() {
                    Some(handler) => {
                        error!(error = %err, "tree stream failed");
                        handler(err);
                    }
                    None => panic!("tree stream failed: {err}"),
                }
                break;
            }
        }
    }
}

fn apply(
    document: &Document,
    container: &NodeRef,
    current: Option<(VNode, NodeRef)>,
    snapshot: &VNode,
) -> (VNode, NodeRef) {
    match current {
        None => {
            let context = container.namespace().unwrap_or(Namespace::Html);
            let (materialized, node) = create_in(document, snapshot, context);
            container.append_child(&node);
            (materialized, node)
        }
        Some((previous, live)) => patch(document, &live, &previous, snapshot),
    }
}
