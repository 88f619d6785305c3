//! Selector registry and event delegation.
//!
//! All registry state is owned by the driver instance behind one
//! `Rc<RefCell<Registry>>`, never ambient. Selections carry a chain of
//! compound scopes; matches are re-evaluated against the live document
//! whenever they are needed (on every patch for element observers, on
//! every dispatch for events), so concurrent re-renders can never leave a
//! subscriber looking at a cached, stale match set.
//!
//! Event delegation is reference-counted: the first `events(type)` call
//! attaches one bubbling listener for that type on the container, shared by
//! every selection; dropping the last stream of that type detaches it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::stream::Stream;
use smallvec::SmallVec;
use tracing::debug;

use weir_dom::{parse_scope, query_all, Compound, DomEvent, ListenerId, NodeRef};

use crate::task::TaskHandle;

type ScopeChain = SmallVec<[Compound; 4]>;

/// Shared driver-instance state: element observers, event subscriptions and
/// the delegated listeners backing them.
pub(crate) struct Registry {
    container: NodeRef,
    element_subs: Vec<ElementsSub>,
    event_subs: Vec<EventSub>,
    delegated: HashMap<String, Delegated>,
    next_sub_id: u64,
    pub(crate) render_task: Option<TaskHandle>,
    disposed: bool,
}

struct ElementsSub {
    id: u64,
    chain: ScopeChain,
    sender: UnboundedSender<Vec<NodeRef>>,
}

struct EventSub {
    id: u64,
    chain: ScopeChain,
    event_type: String,
    sender: UnboundedSender<DomEvent>,
}

struct Delegated {
    listener: ListenerId,
    refcount: usize,
}

impl Registry {
    pub(crate) fn new(container: NodeRef) -> Self {
        Self {
            container,
            element_subs: Vec::new(),
            event_subs: Vec::new(),
            delegated: HashMap::new(),
            next_sub_id: 0,
            render_task: None,
            disposed: false,
        }
    }

    fn allocate_sub_id(&mut self) -> u64 {
        let id = self.next_sub_id;
        self.next_sub_id += 1;
        id
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        // Dropping the handle cancels the render loop and, transitively,
        // every nested stream subscription it owns.
        self.render_task = None;
        for (event_type, delegated) in self.delegated.drain() {
            self.container.remove_event_listener(delegated.listener);
            debug!(%event_type, "detached delegated listener");
        }
        self.element_subs.clear();
        self.event_subs.clear();
    }
}

/// Resolve a scope chain against the live tree: each compound narrows the
/// search to descendants of the previous level's matches. An empty chain
/// denotes the container itself. Results are deduplicated, in document
/// order of first occurrence.
pub(crate) fn match_chain(root: &NodeRef, chain: &[Compound]) -> Vec<NodeRef> {
    if chain.is_empty() {
        return vec![root.clone()];
    }
    let mut current = vec![root.clone()];
    for compound in chain {
        let mut next: Vec<NodeRef> = Vec::new();
        for scope_root in &current {
            for found in query_all(scope_root, compound) {
                if !next.contains(&found) {
                    next.push(found);
                }
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

/// Called by the render loop after each applied patch: every element
/// observer gets the match set as of the freshly committed tree.
pub(crate) fn notify_patch(state: &Rc<RefCell<Registry>>) {
    let subs: Vec<(u64, ScopeChain, UnboundedSender<Vec<NodeRef>>)>;
    let container;
    {
        let registry = state.borrow();
        if registry.disposed {
            return;
        }
        container = registry.container.clone();
        subs = registry
            .element_subs
            .iter()
            .map(|sub| (sub.id, sub.chain.clone(), sub.sender.clone()))
            .collect();
    }

    let mut dead = Vec::new();
    for (id, chain, sender) in subs {
        let matched = match_chain(&container, &chain);
        if sender.unbounded_send(matched).is_err() {
            dead.push(id);
        }
    }
    if !dead.is_empty() {
        state
            .borrow_mut()
            .element_subs
            .retain(|sub| !dead.contains(&sub.id));
    }
}

/// Delegated dispatch: route one bubbled event to every subscription whose
/// chain currently matches an element containing the target.
fn deliver(state: &Rc<RefCell<Registry>>, event: &DomEvent) {
    let subs: Vec<(ScopeChain, UnboundedSender<DomEvent>)>;
    let container;
    {
        let registry = state.borrow();
        if registry.disposed {
            return;
        }
        container = registry.container.clone();
        subs = registry
            .event_subs
            .iter()
            .filter(|sub| sub.event_type == event.event_type())
            .map(|sub| (sub.chain.clone(), sub.sender.clone()))
            .collect();
    }

    let target = event.target();
    for (chain, sender) in subs {
        let matched = match_chain(&container, &chain);
        if matched.iter().any(|element| element.contains(&target)) {
            let _ = sender.unbounded_send(event.clone());
        }
    }
}

/// The root source object returned by the driver: `select` plus disposal.
#[derive(Clone)]
pub struct DomSource {
    state: Rc<RefCell<Registry>>,
}

impl DomSource {
    pub(crate) fn new(state: Rc<RefCell<Registry>>) -> Self {
        Self { state }
    }

    /// The container under driver control.
    pub fn container(&self) -> NodeRef {
        self.state.borrow().container.clone()
    }

    /// Scope a selection to `scope`. The special scope `:root` denotes the
    /// container itself.
    pub fn select(&self, scope: &str) -> Selection {
        Selection {
            state: self.state.clone(),
            chain: ScopeChain::new(),
        }
        .select(scope)
    }

    /// Tear down the render loop, every delegated listener and every
    /// subscription. Idempotent; the document keeps its last valid state.
    pub fn dispose(&self) {
        self.state.borrow_mut().dispose();
    }
}

/// A handle scoped to a selector chain, exposing the element observable,
/// per-type event streams, and further narrowing.
#[derive(Clone)]
pub struct Selection {
    state: Rc<RefCell<Registry>>,
    chain: ScopeChain,
}

impl Selection {
    /// Extend this selection's chain: matches of the new scope must lie
    /// within an element matched by the current chain.
    pub fn select(&self, scope: &str) -> Selection {
        let mut chain = self.chain.clone();
        if scope.trim() != ":root" {
            chain.extend(parse_scope(scope));
        }
        Selection {
            state: self.state.clone(),
            chain,
        }
    }

    /// Stream of the current match set: one emission at subscribe time
    /// (the pre-patch state), then one per applied patch. A scope that
    /// matches nothing yields empty sets, never an error.
    pub fn elements(&self) -> ElementsStream {
        let (sender, receiver) = mpsc::unbounded();
        let mut registry = self.state.borrow_mut();
        let matched = match_chain(&registry.container, &self.chain);
        let _ = sender.unbounded_send(matched);
        if !registry.disposed {
            let id = registry.allocate_sub_id();
            registry.element_subs.push(ElementsSub {
                id,
                chain: self.chain.clone(),
                sender,
            });
            ElementsStream {
                receiver,
                registry: Rc::downgrade(&self.state),
                id,
            }
        } else {
            ElementsStream {
                receiver,
                registry: Weak::new(),
                id: 0,
            }
        }
    }

    /// Stream of interaction events of `event_type` whose target lies, at
    /// dispatch time, inside an element matched by this chain.
    pub fn events(&self, event_type: &str) -> EventStream {
        let (sender, receiver) = mpsc::unbounded();
        let mut registry = self.state.borrow_mut();
        if registry.disposed {
            return EventStream {
                receiver,
                registry: Weak::new(),
                id: 0,
                event_type: event_type.to_owned(),
            };
        }

        if !registry.delegated.contains_key(event_type) {
            let weak = Rc::downgrade(&self.state);
            let listener = registry
                .container
                .add_event_listener(event_type, move |event| {
                    if let Some(state) = weak.upgrade() {
                        deliver(&state, event);
                    }
                });
            debug!(%event_type, "attached delegated listener");
            registry
                .delegated
                .insert(event_type.to_owned(), Delegated { listener, refcount: 0 });
        }
        if let Some(delegated) = registry.delegated.get_mut(event_type) {
            delegated.refcount += 1;
        }

        let id = registry.allocate_sub_id();
        registry.event_subs.push(EventSub {
            id,
            chain: self.chain.clone(),
            event_type: event_type.to_owned(),
            sender,
        });
        EventStream {
            receiver,
            registry: Rc::downgrade(&self.state),
            id,
            event_type: event_type.to_owned(),
        }
    }
}

/// Element observable; dropping it unregisters the subscription.
pub struct ElementsStream {
    receiver: UnboundedReceiver<Vec<NodeRef>>,
    registry: Weak<RefCell<Registry>>,
    id: u64,
}

impl Stream for ElementsStream {
    type Item = Vec<NodeRef>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().receiver).poll_next(cx)
    }
}

impl Drop for ElementsStream {
    fn drop(&mut self) {
        if let Some(state) = self.registry.upgrade() {
            state
                .borrow_mut()
                .element_subs
                .retain(|sub| sub.id != self.id);
        }
    }
}

/// Delegated event stream; dropping it releases its share of the delegated
/// listener, detaching the listener when it was the last one.
pub struct EventStream {
    receiver: UnboundedReceiver<DomEvent>,
    registry: Weak<RefCell<Registry>>,
    id: u64,
    event_type: String,
}

impl Stream for EventStream {
    type Item = DomEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().receiver).poll_next(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        let Some(state) = self.registry.upgrade() else {
            return;
        };
        let mut registry = state.borrow_mut();
        registry.event_subs.retain(|sub| sub.id != self.id);
        let release = match registry.delegated.get_mut(&self.event_type) {
            Some(delegated) => {
                delegated.refcount = delegated.refcount.saturating_sub(1);
                delegated.refcount == 0
            }
            None => false,
        };
        if release {
            if let Some(delegated) = registry.delegated.remove(&self.event_type) {
                registry.container.remove_event_listener(delegated.listener);
                debug!(event_type = %self.event_type, "detached delegated listener");
            }
        }
    }
}
