//! Async tree resolver.
//!
//! Collapses a [`TreeNode`], whose positions may be pending on nested
//! streams, into a stream of fully concrete [`VNode`] snapshots. One
//! resolver per render session; resolution consumes the tree and is not
//! restartable.
//!
//! Children combine with latest-value semantics keyed by structural
//! position: the parent emits once every child has produced a value, then
//! re-emits whenever any child does, carrying every other position's latest
//! value forward unchanged. Stream positions use switch-latest: a new outer
//! emission drops the previous inner stream before the replacement is
//! subscribed, so stale in-flight resolutions can never surface.
//!
//! Within one synchronous batch, children are drained in depth-first
//! left-to-right structural order and the last write for a position wins;
//! the whole batch coalesces into a single parent snapshot.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, FusedStream, LocalBoxStream, Stream, StreamExt};

use weir_dom::{VElement, VNode};

use crate::tree::{DynError, TreeElement, TreeNode, TreeResult};

/// The resolver's output: concrete snapshots, or the failure that
/// terminated resolution.
pub type ResolvedStream = LocalBoxStream<'static, Result<VNode, DynError>>;

/// Resolve a virtual tree into a stream of concrete snapshots.
pub fn resolve(root: TreeNode) -> ResolvedStream {
    match root {
        TreeNode::Text(data) => {
            stream::once(async move { Ok(VNode::Text(data)) }).boxed_local()
        }
        TreeNode::Thunk(thunk) => {
            stream::once(async move { Ok(VNode::Thunk(thunk)) }).boxed_local()
        }
        TreeNode::Widget(widget) => {
            stream::once(async move { Ok(VNode::Widget(widget)) }).boxed_local()
        }
        TreeNode::Element(element) => resolve_element(element),
        TreeNode::Stream(node_stream) => SwitchResolve {
            outer: node_stream.into_inner().fuse(),
            inner: None,
            done: false,
        }
        .boxed_local(),
    }
}

fn resolve_element(element: TreeElement) -> ResolvedStream {
    let TreeElement { tag, attrs, children } = element;
    if children.is_empty() {
        return stream::once(async move {
            Ok(VNode::Element(VElement {
                tag,
                attrs,
                children: Vec::new(),
            }))
        })
        .boxed_local();
    }

    CombineChildren::new(children.into_iter().map(resolve).collect())
        .map(move |result| {
            result.map(|children| {
                VNode::Element(VElement {
                    tag: tag.clone(),
                    attrs: attrs.clone(),
                    children,
                })
            })
        })
        .boxed_local()
}

/// Positional combine-latest over child streams.
struct CombineChildren {
    children: Vec<stream::Fuse<ResolvedStream>>,
    latest: Vec<Option<VNode>>,
    failed: bool,
}

impl CombineChildren {
    fn new(children: Vec<ResolvedStream>) -> Self {
        let latest = children.iter().map(|_| None).collect();
        Self {
            children: children.into_iter().map(StreamExt::fuse).collect(),
            latest,
            failed: false,
        }
    }
}

impl Stream for CombineChildren {
    type Item = Result<Vec<VNode>, DynError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }

        let mut changed = false;
        for (index, child) in this.children.iter_mut().enumerate() {
            // Drain everything the child has ready; the last value wins.
            loop {
                match child.poll_next_unpin(cx) {
                    Poll::Ready(Some(Ok(value))) => {
                        this.latest[index] = Some(value);
                        changed = true;
                    }
                    Poll::Ready(Some(Err(error))) => {
                        this.failed = true;
                        return Poll::Ready(Some(Err(error)));
                    }
                    Poll::Ready(None) | Poll::Pending => break,
                }
            }
        }

        if changed && this.latest.iter().all(Option::is_some) {
            let snapshot = this.latest.iter().filter_map(Clone::clone).collect();
            return Poll::Ready(Some(Ok(snapshot)));
        }
        if this.children.iter().all(FusedStream::is_terminated) {
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}

/// Switch-latest over a stream position: each outer emission is itself
/// resolved and replaces the previously active inner stream by dropping
/// it, which cancels its nested subscriptions transitively.
struct SwitchResolve {
    outer: stream::Fuse<LocalBoxStream<'static, TreeResult>>,
    inner: Option<ResolvedStream>,
    done: bool,
}

impl Stream for SwitchResolve {
    type Item = Result<VNode, DynError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        // Drain the outer stream first: within one batch only the newest
        // tree survives, and it supersedes whatever the old inner stream
        // still had in flight.
        let mut switched = None;
        loop {
            match this.outer.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(node))) => switched = Some(node),
                Poll::Ready(Some(Err(error))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(None) | Poll::Pending => break,
            }
        }
        if let Some(node) = switched {
            this.inner = Some(resolve(node));
        }

        if let Some(inner) = this.inner.as_mut() {
            match inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(value))) => return Poll::Ready(Some(Ok(value))),
                Poll::Ready(Some(Err(error))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(None) => this.inner = None,
                Poll::Pending => return Poll::Pending,
            }
        }

        if this.outer.is_terminated() && this.inner.is_none() {
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}
