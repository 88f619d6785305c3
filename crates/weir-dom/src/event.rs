//! Interaction events: per-node listeners and bubbling dispatch.
//!
//! Dispatch snapshots the bubble path and each node's listener table before
//! invoking anything, so listeners are free to attach or detach listeners
//! (or mutate the tree) while an event is in flight.

use std::cell::Cell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::document::NodeRef;

/// One delivered interaction event. Cloning is cheap; every subscriber gets
/// its own copy carrying the original target.
#[derive(Clone)]
pub struct DomEvent {
    event_type: Rc<str>,
    target: NodeRef,
}

impl DomEvent {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> NodeRef {
        self.target.clone()
    }
}

impl std::fmt::Debug for DomEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomEvent")
            .field("event_type", &self.event_type)
            .field("target", &self.target)
            .finish()
    }
}

/// Handle for removing a previously attached listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

thread_local! {
    static NEXT_LISTENER_ID: Cell<u64> = const { Cell::new(0) };
}

fn next_listener_id() -> ListenerId {
    NEXT_LISTENER_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        ListenerId(id)
    })
}

pub(crate) struct RegisteredListener {
    pub(crate) id: ListenerId,
    pub(crate) event_type: Rc<str>,
    pub(crate) callback: Rc<dyn Fn(&DomEvent)>,
}

impl NodeRef {
    /// Attach a listener for `event_type` on this node. The listener fires
    /// for events dispatched on this node or bubbling up through it.
    pub fn add_event_listener(
        &self,
        event_type: &str,
        callback: impl Fn(&DomEvent) + 'static,
    ) -> ListenerId {
        let id = next_listener_id();
        self.data.borrow_mut().listeners.push(RegisteredListener {
            id,
            event_type: Rc::from(event_type),
            callback: Rc::new(callback),
        });
        id
    }

    /// Detach a listener. Returns false when the id is unknown (already
    /// removed, or registered on another node).
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut data = self.data.borrow_mut();
        match data.listeners.iter().position(|listener| listener.id == id) {
            Some(index) => {
                data.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of listeners attached here for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.data
            .borrow()
            .listeners
            .iter()
            .filter(|listener| &*listener.event_type == event_type)
            .count()
    }

    /// Dispatch an event of `event_type` targeting this node, bubbling from
    /// the target up to the tree root.
    pub fn dispatch(&self, event_type: &str) {
        let event = DomEvent {
            event_type: Rc::from(event_type),
            target: self.clone(),
        };
        let mut path: SmallVec<[NodeRef; 8]> = SmallVec::new();
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            cursor = node.parent();
            path.push(node);
        }
        for node in path {
            let callbacks: SmallVec<[Rc<dyn Fn(&DomEvent)>; 4]> = node
                .data
                .borrow()
                .listeners
                .iter()
                .filter(|listener| *listener.event_type == *event.event_type)
                .map(|listener| listener.callback.clone())
                .collect();
            for callback in callbacks {
                callback(&event);
            }
        }
    }
}
