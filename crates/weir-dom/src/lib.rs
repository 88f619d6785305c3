//! Headless document tree plus the concrete virtual tree and its
//! diff/patch engine.
//!
//! This crate is the "document side" of the weir driver: the mutable tree
//! that gets patched ([`document`]), interaction events with bubbling
//! dispatch ([`event`]), compound selector matching ([`selector`]), and the
//! concrete virtual-node model with positional diff/patch ([`patch`]).
//! The reactive side (stream-carrying trees, the resolver, the render
//! loop and event delegation) lives in the `weir` crate.

pub mod document;
pub mod event;
pub mod patch;
pub mod selector;
pub mod vnode;

pub use document::{Document, MutationCounter, Namespace, NodeRef};
pub use event::{DomEvent, ListenerId};
pub use patch::{create, create_in, patch};
pub use selector::{matches, parse_scope, query_all, Compound};
pub use vnode::{Attrs, Thunk, VElement, VNode, Widget};
