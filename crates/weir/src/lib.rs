//! Reactive document-rendering driver.
//!
//! Feed the driver a stream of virtual trees and it keeps a live document
//! container matching the latest one: tree positions that are themselves
//! streams resolve with switch-latest semantics, snapshots apply as minimal
//! patches, and a scoped selection layer exposes element observables and
//! delegated interaction-event streams over whatever is currently rendered.
//!
//! ```no_run
//! use futures::stream;
//! use weir::dom::Document;
//! use weir::{make_dom_driver, DriverConfig, TreeElement, TreeNode};
//!
//! let document = Document::new();
//! let container = document.create_element("div");
//! document.root().append_child(&container);
//!
//! let view: TreeNode = TreeElement::new("div")
//!     .attr("class", "counter")
//!     .child("0 clicks")
//!     .into();
//!
//! let driver = make_dom_driver(&document, container, DriverConfig::new()).unwrap();
//! let source = driver.attach(stream::once(async move { Ok(view) }));
//!
//! let clicks = source.select(".counter").events("click");
//! weir::run_until_stalled();
//! # drop(clicks);
//! ```
//!
//! The document side (node tree, selector matching, diff/patch) lives in
//! [`weir_dom`], re-exported here as [`dom`].

pub mod driver;
pub mod resolve;
pub mod select;
pub mod task;
pub mod tree;

mod render;

pub use driver::{make_dom_driver, DomDriver, DriverConfig, RenderTarget, SetupError};
pub use resolve::{resolve, ResolvedStream};
pub use select::{DomSource, ElementsStream, EventStream, Selection};
pub use task::{run_until_stalled, Task, TaskHandle};
pub use tree::{DynError, NodeStream, TreeElement, TreeNode, TreeResult};

pub use weir_dom as dom;
