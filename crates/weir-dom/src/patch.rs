//! Diff/patch engine over concrete trees.
//!
//! `create` materializes a concrete tree into live nodes; `patch` mutates an
//! already-live node minimally so it matches the next tree. Both return the
//! *materialized* tree that is now live (thunks rendered away, widgets kept
//! as leaves), which is what the next patch must diff against.
//!
//! Reconciliation is positional: children pair up by index, trailing extras
//! are removed, there is no keyed-move pass. Nodes only change when the
//! trees disagree, so patching a tree against itself touches nothing.

use tracing::debug;

use crate::document::{Document, Namespace, NodeRef};
use crate::vnode::{Thunk, VElement, VNode, Widget};

/// Materialize `vnode` into a live node, in HTML context.
pub fn create(document: &Document, vnode: &VNode) -> (VNode, NodeRef) {
    create_in(document, vnode, Namespace::Html)
}

/// Materialize `vnode` into a live node under the given ancestor namespace
/// context. The `svg` tag switches the context for itself and everything
/// below it.
pub fn create_in(document: &Document, vnode: &VNode, context: Namespace) -> (VNode, NodeRef) {
    match vnode {
        VNode::Text(data) => (VNode::Text(data.clone()), document.create_text(data)),
        VNode::Element(element) => {
            let namespace = element_namespace(element, context);
            let node = document.create_element_ns(namespace, &element.tag);
            for (name, value) in &element.attrs {
                node.set_attribute(name, value);
            }
            let mut materialized = Vec::with_capacity(element.children.len());
            for child in &element.children {
                let (child_materialized, child_node) = create_in(document, child, namespace);
                node.append_child(&child_node);
                materialized.push(child_materialized);
            }
            (
                VNode::Element(VElement {
                    tag: element.tag.clone(),
                    attrs: element.attrs.clone(),
                    children: materialized,
                }),
                node,
            )
        }
        VNode::Thunk(thunk) => {
            let rendered = materialize_thunk(thunk.as_ref(), None);
            create_in(document, &rendered, context)
        }
        VNode::Widget(widget) => (VNode::Widget(widget.clone()), widget.init(document)),
    }
}

/// Patch `live` (currently displaying `previous`) so it displays `next`.
///
/// `previous` must be the materialized tree returned by the `create`/`patch`
/// call that produced `live`'s current state. Returns the new materialized
/// tree and the node now standing at this position, which is a different
/// node when an incompatible `next` forced a replacement.
pub fn patch(
    document: &Document,
    live: &NodeRef,
    previous: &VNode,
    next: &VNode,
) -> (VNode, NodeRef) {
    let context = live
        .parent()
        .and_then(|parent| parent.namespace())
        .unwrap_or(Namespace::Html);
    patch_in(document, live, previous, next, context)
}

fn patch_in(
    document: &Document,
    live: &NodeRef,
    previous: &VNode,
    next: &VNode,
    context: Namespace,
) -> (VNode, NodeRef) {
    if let VNode::Thunk(thunk) = next {
        let rendered = materialize_thunk(thunk.as_ref(), Some(previous));
        return patch_in(document, live, previous, &rendered, context);
    }

    match (previous, next) {
        (VNode::Text(old), VNode::Text(new)) => {
            if old != new {
                live.set_text(new);
            }
            (VNode::Text(new.clone()), live.clone())
        }
        (VNode::Element(old), VNode::Element(new))
            if old.tag.eq_ignore_ascii_case(&new.tag) =>
        {
            patch_element(document, live, old, new)
        }
        (VNode::Widget(old), VNode::Widget(new)) if old.kind() == new.kind() => {
            new.update(old.as_ref(), live);
            (VNode::Widget(new.clone()), live.clone())
        }
        _ => {
            debug!(node = %live.id(), "replacing incompatible node");
            let (materialized, replacement) = create_in(document, next, context);
            if let Some(parent) = live.parent() {
                parent.replace_child(live, &replacement);
            }
            (materialized, replacement)
        }
    }
}

fn patch_element(
    document: &Document,
    live: &NodeRef,
    old: &VElement,
    new: &VElement,
) -> (VNode, NodeRef) {
    for (name, value) in &new.attrs {
        if old.attrs.get(name) != Some(value) {
            live.set_attribute(name, value);
        }
    }
    for name in old.attrs.keys() {
        if !new.attrs.contains_key(name) {
            live.remove_attribute(name);
        }
    }

    let child_context = live.namespace().unwrap_or(Namespace::Html);
    let mut materialized = Vec::with_capacity(new.children.len());
    for (index, next_child) in new.children.iter().enumerate() {
        match (old.children.get(index), live.child(index)) {
            (Some(previous_child), Some(child_node)) => {
                let (child_materialized, _) =
                    patch_in(document, &child_node, previous_child, next_child, child_context);
                materialized.push(child_materialized);
            }
            _ => {
                let (child_materialized, child_node) =
                    create_in(document, next_child, child_context);
                live.append_child(&child_node);
                materialized.push(child_materialized);
            }
        }
    }
    while live.child_count() > new.children.len() {
        live.remove_child(live.child_count() - 1);
    }

    (
        VNode::Element(VElement {
            tag: new.tag.clone(),
            attrs: new.attrs.clone(),
            children: materialized,
        }),
        live.clone(),
    )
}

fn element_namespace(element: &VElement, context: Namespace) -> Namespace {
    if element.tag.eq_ignore_ascii_case("svg") {
        Namespace::Svg
    } else {
        context
    }
}

fn materialize_thunk(thunk: &dyn Thunk, previous: Option<&VNode>) -> VNode {
    let mut rendered = thunk.render(previous);
    while let VNode::Thunk(inner) = rendered {
        rendered = inner.render(previous);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn sample_tree() -> VNode {
        VElement::new("div")
            .attr("class", "top-most")
            .child(VElement::new("p").child("Foo"))
            .child(VElement::new("span").child("Bar"))
            .into()
    }

    #[test]
    fn create_builds_live_tree() {
        let document = Document::new();
        let (_, node) = create(&document, &sample_tree());

        assert_eq!(
            node.to_html(),
            r#"<div class="top-most"><p>Foo</p><span>Bar</span></div>"#
        );
    }

    #[test]
    fn patching_identical_tree_touches_nothing() {
        let document = Document::new();
        let (materialized, node) = create(&document, &sample_tree());
        let before = document.mutations();

        let (materialized, _) = patch(&document, &node, &materialized, &sample_tree());
        assert_eq!(document.mutations(), before);

        // And once more, via the tree returned by the previous patch.
        patch(&document, &node, &materialized, &sample_tree());
        assert_eq!(document.mutations(), before);
    }

    #[test]
    fn patch_updates_text_and_attributes() {
        let document = Document::new();
        let old: VNode = VElement::new("div")
            .attr("class", "a")
            .attr("data-x", "1")
            .child("hello")
            .into();
        let new: VNode = VElement::new("div")
            .attr("class", "b")
            .child("world")
            .into();
        let (materialized, node) = create(&document, &old);

        patch(&document, &node, &materialized, &new);

        assert_eq!(node.attribute("class").as_deref(), Some("b"));
        assert_eq!(node.attribute("data-x"), None);
        assert_eq!(node.text_content(), "world");
    }

    #[test]
    fn patch_reconciles_children_by_position() {
        let document = Document::new();
        let old: VNode = VElement::new("ul")
            .child(VElement::new("li").child("one"))
            .child(VElement::new("li").child("two"))
            .child(VElement::new("li").child("three"))
            .into();
        let new: VNode = VElement::new("ul")
            .child(VElement::new("li").child("one"))
            .child(VElement::new("li").child("2"))
            .into();
        let (materialized, node) = create(&document, &old);
        let first = node.child(0).unwrap();

        patch(&document, &node, &materialized, &new);

        assert_eq!(node.child_count(), 2);
        // Positional reconciliation keeps the node at position 0 alive.
        assert_eq!(node.child(0), Some(first));
        assert_eq!(node.to_html(), "<ul><li>one</li><li>2</li></ul>");
    }

    #[test]
    fn patch_replaces_on_tag_change() {
        let document = Document::new();
        let parent = document.create_element("div");
        let old: VNode = VElement::new("p").child("x").into();
        let (materialized, node) = create(&document, &old);
        parent.append_child(&node);

        let new: VNode = VElement::new("section").child("x").into();
        let (_, replacement) = patch(&document, &node, &materialized, &new);

        assert_ne!(replacement, node);
        assert_eq!(node.parent(), None);
        assert_eq!(parent.child(0), Some(replacement));
        assert_eq!(parent.to_html(), "<div><section>x</section></div>");
    }

    struct CountingThunk {
        renders: Rc<Cell<usize>>,
        saw_previous: Rc<Cell<bool>>,
    }

    impl Thunk for CountingThunk {
        fn render(&self, previous: Option<&VNode>) -> VNode {
            self.renders.set(self.renders.get() + 1);
            if previous.is_some() {
                self.saw_previous.set(true);
            }
            VElement::new("div").child("thunked").into()
        }
    }

    #[test]
    fn thunk_renders_with_previous_value() {
        let document = Document::new();
        let renders = Rc::new(Cell::new(0));
        let saw_previous = Rc::new(Cell::new(false));
        let make = || {
            VNode::thunk(CountingThunk {
                renders: renders.clone(),
                saw_previous: saw_previous.clone(),
            })
        };

        let (materialized, node) = create(&document, &make());
        assert_eq!(renders.get(), 1);
        assert!(!saw_previous.get());
        assert_eq!(node.text_content(), "thunked");

        let before = document.mutations();
        patch(&document, &node, &materialized, &make());
        assert_eq!(renders.get(), 2);
        assert!(saw_previous.get());
        assert_eq!(document.mutations(), before);
    }

    struct ProbeWidget {
        name: &'static str,
        inits: Rc<Cell<usize>>,
        updates: Rc<Cell<usize>>,
    }

    impl Widget for ProbeWidget {
        fn kind(&self) -> &'static str {
            self.name
        }

        fn init(&self, document: &Document) -> NodeRef {
            self.inits.set(self.inits.get() + 1);
            document.create_element("canvas")
        }

        fn update(&self, _previous: &dyn Widget, node: &NodeRef) {
            self.updates.set(self.updates.get() + 1);
            node.set_attribute("data-updated", "true");
        }
    }

    #[test]
    fn widget_init_then_update_then_replace() {
        let document = Document::new();
        let parent = document.create_element("div");
        let inits = Rc::new(Cell::new(0));
        let updates = Rc::new(Cell::new(0));
        let make = |name| {
            VNode::widget(ProbeWidget {
                name,
                inits: inits.clone(),
                updates: updates.clone(),
            })
        };

        let (materialized, node) = create(&document, &make("chart"));
        parent.append_child(&node);
        assert_eq!((inits.get(), updates.get()), (1, 0));

        let (materialized, kept) = patch(&document, &node, &materialized, &make("chart"));
        assert_eq!(kept, node);
        assert_eq!((inits.get(), updates.get()), (1, 1));
        assert_eq!(node.attribute("data-updated").as_deref(), Some("true"));

        let (_, replacement) = patch(&document, &node, &materialized, &make("gauge"));
        assert_ne!(replacement, node);
        assert_eq!((inits.get(), updates.get()), (2, 1));
        assert_eq!(parent.child(0), Some(replacement));
    }

    #[test]
    fn widget_update_may_leave_node_untouched() {
        struct InertWidget;

        impl Widget for InertWidget {
            fn kind(&self) -> &'static str {
                "inert"
            }

            fn init(&self, document: &Document) -> NodeRef {
                document.create_element("canvas")
            }
        }

        let document = Document::new();
        let (materialized, node) = create(&document, &VNode::widget(InertWidget));
        let before = document.mutations();

        patch(&document, &node, &materialized, &VNode::widget(InertWidget));
        assert_eq!(document.mutations(), before);
    }

    #[test]
    fn svg_namespace_is_inherited_from_ancestor_context() {
        let document = Document::new();
        let tree: VNode = VElement::new("div")
            .child(
                VElement::new("svg").child(VElement::new("rect")),
            )
            .child(VElement::new("span"))
            .into();

        let (materialized, node) = create(&document, &tree);

        let svg = node.child(0).unwrap();
        assert_eq!(svg.namespace(), Some(Namespace::Svg));
        assert_eq!(svg.child(0).unwrap().namespace(), Some(Namespace::Svg));
        assert_eq!(node.child(1).unwrap().namespace(), Some(Namespace::Html));

        // Children patched into an svg subtree inherit the namespace too.
        let next: VNode = VElement::new("div")
            .child(
                VElement::new("svg")
                    .child(VElement::new("rect"))
                    .child(VElement::new("circle")),
            )
            .child(VElement::new("span"))
            .into();
        patch(&document, &node, &materialized, &next);
        assert_eq!(svg.child(1).unwrap().namespace(), Some(Namespace::Svg));
    }
}
