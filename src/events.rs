//! Event plumbing shared by components and collections
//!
//! Every component and every collection owns an [`Emitter`]. Emitters support
//! two styles of subscription:
//!
//! - **Local**: `on` / `off` / `trigger` on the emitter itself.
//! - **Scoped**: `listen_to` registers a handler on *another* emitter and
//!   remembers it, so `stop_listening` can later drop every registration made
//!   on a given target in one call.
//!
//! # Dispatch
//!
//! ```text
//! trigger("component:shown") → snapshot handlers → release borrow → call each
//! ```
//!
//! Handlers are snapshotted before dispatch, so a handler may freely register,
//! remove or trigger further events (including on the same emitter) without
//! tripping a `RefCell` borrow. Handlers added during a dispatch are not
//! called for that dispatch.

use crate::component::Component;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

// ─────────────────────────────────────────────────────────────────────────────
// Event names (stable external contract)
// ─────────────────────────────────────────────────────────────────────────────

/// Emitted by a component right before it becomes visible
pub const COMPONENT_SHOWN: &str = "component:shown";
/// Emitted by a component right after its view was hidden
pub const COMPONENT_HIDDEN: &str = "component:hidden";
/// Re-emitted by a parent whenever one of its children announced itself shown
pub const SUB_COMPONENT_SHOWN: &str = "subComponent:shown";
/// Emitted by a collection component after a load was applied
pub const COLLECTION_LOADED: &str = "collectionLoaded";
/// Emitted by a collection component when a deferred load failed
pub const COLLECTION_ERROR: &str = "collectionError";
/// Emitted by a collection when its contents were replaced
pub const RESET: &str = "reset";

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Token identifying a single handler registration
///
/// Removal is by token rather than by function identity: closures in Rust
/// have no comparable identity, so `on` hands back the token instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Payload of a `component:*` / `subComponent:*` event
#[derive(Debug, Clone)]
pub struct ComponentEvent {
    pub name: String,
    pub component: Component,
}

/// Data carried by an event
#[derive(Debug, Clone, Default)]
pub enum EventData {
    /// No payload (`collectionLoaded`, `reset`)
    #[default]
    Empty,
    /// `{name, component}` payload of lifecycle events
    Component(ComponentEvent),
    /// Free-form arguments, relayed untouched by bubbling
    Args(Vec<serde_json::Value>),
}

impl EventData {
    pub fn component(&self) -> Option<&ComponentEvent> {
        match self {
            EventData::Component(evt) => Some(evt),
            _ => None,
        }
    }

    pub fn args(&self) -> &[serde_json::Value] {
        match self {
            EventData::Args(args) => args,
            _ => &[],
        }
    }
}

/// Event handler
pub type Handler = Rc<dyn Fn(&EventData)>;

// ─────────────────────────────────────────────────────────────────────────────
// Emitter
// ─────────────────────────────────────────────────────────────────────────────

struct Registration {
    id: ListenerId,
    event: String,
    handler: Handler,
}

/// A registration this emitter made on another emitter via `listen_to`
struct Listening {
    target: Weak<RefCell<Registry>>,
    id: ListenerId,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<Registration>,
    listening: Vec<Listening>,
}

/// Publish/subscribe hub (cheap to clone, clones share registrations)
#[derive(Clone, Default)]
pub struct Emitter {
    registry: Rc<RefCell<Registry>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event`
    pub fn on(&self, event: impl Into<String>, handler: impl Fn(&EventData) + 'static) -> ListenerId {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.handlers.push(Registration {
            id,
            event: event.into(),
            handler: Rc::new(handler),
        });
        id
    }

    /// Remove a single registration. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.borrow_mut();
        let before = registry.handlers.len();
        registry.handlers.retain(|r| r.id != id);
        registry.handlers.len() != before
    }

    /// Remove every handler registered for `event`
    pub fn off_event(&self, event: &str) -> usize {
        let mut registry = self.registry.borrow_mut();
        let before = registry.handlers.len();
        registry.handlers.retain(|r| r.event != event);
        before - registry.handlers.len()
    }

    /// Remove every handler registered on this emitter
    pub fn off_all(&self) {
        self.registry.borrow_mut().handlers.clear();
    }

    /// Call every handler registered for `event`, in registration order.
    ///
    /// Returns the number of handlers invoked.
    pub fn trigger(&self, event: &str, data: &EventData) -> usize {
        let handlers: Vec<Handler> = self
            .registry
            .borrow()
            .handlers
            .iter()
            .filter(|r| r.event == event)
            .map(|r| Rc::clone(&r.handler))
            .collect();

        for handler in &handlers {
            handler(data);
        }
        handlers.len()
    }

    /// Subscribe to `event` on `target` and remember the registration
    pub fn listen_to(
        &self,
        target: &Emitter,
        event: impl Into<String>,
        handler: impl Fn(&EventData) + 'static,
    ) -> ListenerId {
        let id = target.on(event, handler);
        self.registry.borrow_mut().listening.push(Listening {
            target: Rc::downgrade(&target.registry),
            id,
        });
        id
    }

    /// Drop registrations made through `listen_to`.
    ///
    /// `Some(target)` drops only those made on `target`; `None` drops all.
    /// Returns the number of registrations removed.
    pub fn stop_listening(&self, target: Option<&Emitter>) -> usize {
        let removed: Vec<Listening> = {
            let mut registry = self.registry.borrow_mut();
            let all = std::mem::take(&mut registry.listening);
            let (removed, kept): (Vec<Listening>, Vec<Listening>) =
                all.into_iter().partition(|l| match target {
                    Some(t) => l.target.ptr_eq(&Rc::downgrade(&t.registry)),
                    None => true,
                });
            registry.listening = kept;
            removed
        };

        // The target may be this very emitter, so the borrow above must be released first
        let mut count = 0;
        for listening in removed {
            if let Some(registry) = listening.target.upgrade() {
                if (Emitter { registry }).off(listening.id) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Drop one registration made through `listen_to`
    pub fn stop_listening_to(&self, target: &Emitter, id: ListenerId) -> bool {
        let target_ref = Rc::downgrade(&target.registry);
        let tracked = {
            let mut registry = self.registry.borrow_mut();
            let before = registry.listening.len();
            registry
                .listening
                .retain(|l| !(l.id == id && l.target.ptr_eq(&target_ref)));
            registry.listening.len() != before
        };
        tracked && target.off(id)
    }

    /// Number of handlers registered for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .borrow()
            .handlers
            .iter()
            .filter(|r| r.event == event)
            .count()
    }

    /// Number of live registrations this emitter holds on other emitters
    pub fn listening_count(&self) -> usize {
        self.registry
            .borrow()
            .listening
            .iter()
            .filter(|l| l.target.strong_count() > 0)
            .count()
    }

    pub fn ptr_eq(&self, other: &Emitter) -> bool {
        Rc::ptr_eq(&self.registry, &other.registry)
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.registry.try_borrow() {
            Ok(registry) => f
                .debug_struct("Emitter")
                .field("handlers", &registry.handlers.len())
                .field("listening", &registry.listening.len())
                .finish(),
            Err(_) => f.write_str("Emitter { <dispatching> }"),
        }
    }
}
