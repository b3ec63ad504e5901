//! Component tree: lifecycle state machine, nesting and event relay
//!
//! A [`Component`] is a cheap, cloneable handle to a node of a UI composition
//! tree. Each node owns:
//!
//! - its visibility and setup state (`{Hidden, Visible} × {NotSetup, Setup}`),
//! - its effective options (see [`crate::options`]),
//! - a registry of named children (the parent owns its children),
//! - an [`Emitter`] used for lifecycle events and bubbling relays,
//! - an optional [`View`] that lifecycle transitions are forwarded to.
//!
//! # Visibility propagation
//!
//! ```text
//!   child.show()
//!     ├─ trigger component:shown ──▶ parent.handle_sub_component_shown()
//!     │                                 ├─ singly? hide siblings, remember child
//!     │                                 ├─ trigger subComponent:shown
//!     │                                 └─ parent.show() ──▶ grandparent ...
//!     ├─ view.show()
//!     ├─ setup hook (once per visible session)
//!     └─ visible = true
//! ```
//!
//! `component:shown` fires *before* any state changes so ancestors can hide
//! siblings first.
//!
//! # Ownership
//!
//! Parents hold strong handles to children. `parent` and the singly-mode
//! `current_sub_component` are weak. Every closure registered on another
//! emitter captures a [`WeakComponent`], so no reference cycle can form
//! through the event system.

mod tree;
mod view;

#[cfg(test)]
mod tests;

pub use view::{TracingView, View};

use crate::events::{ComponentEvent, Emitter, EventData, ListenerId, COMPONENT_HIDDEN, COMPONENT_SHOWN};
use crate::options::{flag, keys, ComponentClass, Options};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

/// Setup / teardown hook
pub type Hook = Box<dyn FnMut(&Component)>;

/// Options accepted by [`Component::show`]
#[derive(Debug, Clone, Default)]
pub struct ShowOptions {
    /// Skip the `component:shown` announcement
    pub silent: bool,
    /// Fetch parameters (only meaningful to gated components such as collections)
    pub params: Option<Options>,
}

impl ShowOptions {
    pub fn silent() -> Self {
        Self {
            silent: true,
            params: None,
        }
    }

    pub fn with_params(params: Options) -> Self {
        Self {
            silent: false,
            params: Some(params),
        }
    }
}

/// Options accepted by [`Component::hide`]
#[derive(Debug, Clone, Copy, Default)]
pub struct HideOptions {
    /// Skip the `component:hidden` announcement
    pub silent: bool,
}

impl HideOptions {
    pub fn silent() -> Self {
        Self { silent: true }
    }
}

/// Decision of a [`ShowGate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Run the regular show now
    Proceed,
    /// The gate took over; it will call [`Component::show_now`] itself later
    Deferred,
}

/// Specialization hook consulted by every `show` call
///
/// This is how a specialized component (e.g. a collection-backed one)
/// replaces the base show behavior while still being driven through a plain
/// `Component` handle by its parent.
pub trait ShowGate {
    fn intercept(self: Rc<Self>, component: &Component, options: &ShowOptions) -> Gate;
}

/// Errors from component operations that can be misused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// `set_name` after the name was already set or the component was attached
    NameLocked { name: String },
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameLocked { name } => {
                write!(f, "name of component '{}' can no longer be changed", name)
            }
        }
    }
}

impl std::error::Error for ComponentError {}

/// Serializable summary of a subtree
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSnapshot {
    pub name: String,
    pub class: String,
    pub visible: bool,
    pub is_setup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentSnapshot>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Hooks {
    setup: Option<Hook>,
    teardown: Option<Hook>,
}

#[derive(Clone, Copy)]
enum HookKind {
    Setup,
    Teardown,
}

struct State {
    name: String,
    name_locked: bool,
    /// Effective options, with the runtime flags mirrored in
    options: Options,
    /// Options as supplied, back-filled with the effective options
    instance_options: Options,
    visible: bool,
    is_setup: bool,
    /// Registry in insertion order
    children: Vec<(String, Component)>,
    parent: Option<WeakComponent>,
    /// child name -> event name -> relay registration
    bubbled: HashMap<String, HashMap<String, ListenerId>>,
    current: Option<WeakComponent>,
    destroyed: bool,
}

struct Inner {
    class: Arc<ComponentClass>,
    emitter: Emitter,
    state: RefCell<State>,
    view: RefCell<Option<Box<dyn View>>>,
    hooks: RefCell<Hooks>,
    gate: RefCell<Option<Rc<dyn ShowGate>>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handles
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a node of the component tree (clones share the node)
#[derive(Clone)]
pub struct Component {
    inner: Rc<Inner>,
}

/// Non-owning handle to a component
#[derive(Clone)]
pub struct WeakComponent {
    inner: Weak<Inner>,
}

impl WeakComponent {
    pub fn upgrade(&self) -> Option<Component> {
        self.inner.upgrade().map(|inner| Component { inner })
    }

    fn points_to(&self, component: &Component) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Rc::as_ptr(&component.inner))
    }
}

/// Builder for [`Component`]
pub struct ComponentBuilder {
    class: Arc<ComponentClass>,
    options: Options,
    view: Option<Box<dyn View>>,
    hooks: Hooks,
}

impl ComponentBuilder {
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options.extend(options);
        self
    }

    pub fn view(self, view: impl View + 'static) -> Self {
        self.boxed_view(Box::new(view))
    }

    pub fn boxed_view(mut self, view: Box<dyn View>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn on_setup(mut self, hook: impl FnMut(&Component) + 'static) -> Self {
        self.hooks.setup = Some(Box::new(hook));
        self
    }

    pub fn on_teardown(mut self, hook: impl FnMut(&Component) + 'static) -> Self {
        self.hooks.teardown = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Component {
        let mut instance_options = self.options;
        let mut options = self.class.apply_options(&mut instance_options);
        options.insert(keys::IS_SETUP.to_string(), Value::Bool(false));

        Component {
            inner: Rc::new(Inner {
                emitter: Emitter::new(),
                state: RefCell::new(State {
                    name: self.class.default_name(),
                    name_locked: false,
                    options,
                    instance_options,
                    visible: false,
                    is_setup: false,
                    children: Vec::new(),
                    parent: None,
                    bubbled: HashMap::new(),
                    current: None,
                    destroyed: false,
                }),
                class: self.class,
                view: RefCell::new(self.view),
                hooks: RefCell::new(self.hooks),
                gate: RefCell::new(None),
            }),
        }
    }
}

impl Component {
    pub fn builder(class: Arc<ComponentClass>) -> ComponentBuilder {
        ComponentBuilder {
            class,
            options: Options::new(),
            view: None,
            hooks: Hooks::default(),
        }
    }

    /// Component of `class` with the given instance options, no view and no hooks
    pub fn new(class: Arc<ComponentClass>, options: Options) -> Component {
        Self::builder(class).options(options).build()
    }

    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn name(&self) -> String {
        self.inner.state.borrow().name.clone()
    }

    /// Override the default name. Allowed once, before the component is attached.
    pub fn set_name(&self, name: impl Into<String>) -> Result<(), ComponentError> {
        let mut state = self.inner.state.borrow_mut();
        if state.name_locked || state.parent.is_some() {
            return Err(ComponentError::NameLocked {
                name: state.name.clone(),
            });
        }
        state.name = name.into();
        state.name_locked = true;
        Ok(())
    }

    pub fn class(&self) -> &Arc<ComponentClass> {
        &self.inner.class
    }

    pub fn emitter(&self) -> &Emitter {
        &self.inner.emitter
    }

    /// Effective options (runtime flags included)
    pub fn options(&self) -> Options {
        self.inner.state.borrow().options.clone()
    }

    /// Instance options as supplied, back-filled with the effective options
    pub fn instance_options(&self) -> Options {
        self.inner.state.borrow().instance_options.clone()
    }

    pub fn option(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow().options.get(key).cloned()
    }

    pub fn is_visible(&self) -> bool {
        self.inner.state.borrow().visible
    }

    pub fn is_setup(&self) -> bool {
        self.inner.state.borrow().is_setup
    }

    pub fn is_singly(&self) -> bool {
        flag(&self.inner.state.borrow().options, keys::SINGLY)
    }

    pub fn is_overlay(&self) -> bool {
        flag(&self.inner.state.borrow().options, keys::OVERLAY)
    }

    pub fn is_debug(&self) -> bool {
        flag(&self.inner.state.borrow().options, keys::DEBUG)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.borrow().destroyed
    }

    pub fn has_view(&self) -> bool {
        self.inner.view.borrow().is_some()
    }

    pub fn parent(&self) -> Option<Component> {
        self.inner.state.borrow().parent.as_ref().and_then(WeakComponent::upgrade)
    }

    /// Install the specialization consulted by every `show`
    pub fn set_show_gate(&self, gate: Rc<dyn ShowGate>) {
        *self.inner.gate.borrow_mut() = Some(gate);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    pub fn on(&self, event: impl Into<String>, handler: impl Fn(&EventData) + 'static) -> ListenerId {
        self.inner.emitter.on(event, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.emitter.off(id)
    }

    pub fn trigger(&self, event: &str, data: &EventData) -> usize {
        if self.is_debug() {
            tracing::debug!(component = %self.name(), event, "trigger");
        }
        self.inner.emitter.trigger(event, data)
    }

    fn component_event(&self) -> EventData {
        EventData::Component(ComponentEvent {
            name: self.name(),
            component: self.clone(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Show this component.
    ///
    /// Showing an already visible component is not guarded: the view is
    /// rendered again and `component:shown` fires again unless silent.
    pub fn show(&self, options: ShowOptions) -> &Self {
        if self.is_destroyed() {
            tracing::warn!(component = %self.name(), "show on a destructed component ignored");
            return self;
        }

        let gate = self.inner.gate.borrow().clone();
        if let Some(gate) = gate {
            if gate.intercept(self, &options) == Gate::Deferred {
                self.log_transition("show deferred");
                return self;
            }
        }
        self.show_now(&options)
    }

    /// The base show, bypassing any installed [`ShowGate`]
    pub fn show_now(&self, options: &ShowOptions) -> &Self {
        if self.is_destroyed() {
            return self;
        }

        if !options.silent {
            self.trigger(COMPONENT_SHOWN, &self.component_event());
        }

        if let Some(view) = self.inner.view.borrow_mut().as_mut() {
            view.show();
        }

        if !self.is_setup() && self.run_hook(HookKind::Setup) {
            self.set_flag(keys::IS_SETUP, true);
        }

        self.set_flag(keys::VISIBLE, true);
        self.log_transition("shown");
        self
    }

    /// Hide this component. Returns false (and does nothing) if already hidden.
    pub fn hide(&self, options: HideOptions) -> bool {
        if !self.is_visible() {
            return false;
        }

        if let Some(view) = self.inner.view.borrow_mut().as_mut() {
            view.hide();
        }

        if !options.silent {
            self.trigger(COMPONENT_HIDDEN, &self.component_event());
        }

        if self.is_setup() {
            self.run_hook(HookKind::Teardown);
            self.set_flag(keys::IS_SETUP, false);
        }

        self.set_flag(keys::VISIBLE, false);
        self.log_transition("hidden");
        true
    }

    /// Render the view, if any
    pub fn render(&self) {
        if let Some(view) = self.inner.view.borrow_mut().as_mut() {
            view.render();
        }
    }

    /// Run a hook outside of any borrow. Returns false if no hook is installed.
    fn run_hook(&self, kind: HookKind) -> bool {
        let taken = {
            let mut hooks = self.inner.hooks.borrow_mut();
            match kind {
                HookKind::Setup => hooks.setup.take(),
                HookKind::Teardown => hooks.teardown.take(),
            }
        };
        let Some(mut hook) = taken else {
            return false;
        };

        hook(self);

        // Put it back unless the hook replaced itself or the component was destructed meanwhile
        if !self.is_destroyed() {
            let mut hooks = self.inner.hooks.borrow_mut();
            let slot = match kind {
                HookKind::Setup => &mut hooks.setup,
                HookKind::Teardown => &mut hooks.teardown,
            };
            if slot.is_none() {
                *slot = Some(hook);
            }
        }
        true
    }

    /// Update a runtime flag and its mirror in the options mapping
    fn set_flag(&self, key: &str, value: bool) {
        let mut state = self.inner.state.borrow_mut();
        match key {
            keys::VISIBLE => state.visible = value,
            keys::IS_SETUP => state.is_setup = value,
            _ => {}
        }
        state.options.insert(key.to_string(), Value::Bool(value));
    }

    fn log_transition(&self, what: &'static str) {
        if self.is_debug() {
            tracing::debug!(component = %self.name(), "{}", what);
        } else {
            tracing::trace!(component = %self.name(), "{}", what);
        }
    }

    /// Serializable summary of this subtree
    pub fn snapshot(&self) -> ComponentSnapshot {
        let (name, visible, is_setup, current, children) = {
            let state = self.inner.state.borrow();
            (
                state.name.clone(),
                state.visible,
                state.is_setup,
                state.current.as_ref().and_then(WeakComponent::upgrade),
                state
                    .children
                    .iter()
                    .map(|(_, child)| child.clone())
                    .collect::<Vec<_>>(),
            )
        };

        ComponentSnapshot {
            name,
            class: self.inner.class.tag().to_string(),
            visible,
            is_setup,
            current: current.map(|c| c.name()),
            children: children.iter().map(Component::snapshot).collect(),
        }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Component")
                .field("class", &self.inner.class.tag())
                .field("name", &state.name)
                .field("visible", &state.visible)
                .field("is_setup", &state.is_setup)
                .field("children", &state.children.len())
                .finish(),
            Err(_) => f
                .debug_struct("Component")
                .field("class", &self.inner.class.tag())
                .finish_non_exhaustive(),
        }
    }
}

impl fmt::Debug for WeakComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(component) => write!(f, "WeakComponent({:?})", component.name()),
            None => f.write_str("WeakComponent(<dropped>)"),
        }
    }
}
