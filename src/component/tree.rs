//! Tree operations: nesting, singly coordination, bubbling and destruction

use super::{Component, HideOptions, ShowOptions, WeakComponent};
use crate::events::{ComponentEvent, EventData, COMPONENT_SHOWN, SUB_COMPONENT_SHOWN};
use crate::options::{flag, keys};

impl Component {
    // ─────────────────────────────────────────────────────────────────────────
    // Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Child registered under `name`
    pub fn child(&self, name: &str) -> Option<Component> {
        self.inner
            .state
            .borrow()
            .children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, child)| child.clone())
    }

    /// Children in registration order
    pub fn children(&self) -> Vec<(String, Component)> {
        self.inner.state.borrow().children.clone()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.inner
            .state
            .borrow()
            .children
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Most recently shown non-overlay child (singly mode only)
    pub fn current_sub_component(&self) -> Option<Component> {
        self.inner
            .state
            .borrow()
            .current
            .as_ref()
            .and_then(WeakComponent::upgrade)
    }

    /// Relay events this component currently bubbles from `child`
    pub fn bubbled_events(&self, child: &str) -> Vec<String> {
        let mut events: Vec<String> = self
            .inner
            .state
            .borrow()
            .bubbled
            .get(child)
            .map(|relays| relays.keys().cloned().collect())
            .unwrap_or_default();
        events.sort();
        events
    }

    /// Attach `child` under `custom_name` (or the child's own name).
    ///
    /// A child already registered under the same name is replaced and its
    /// subscriptions dropped. A child attached elsewhere, or attached here
    /// under another name, is detached from its previous slot first.
    ///
    /// A child whose `visible` option is set is shown on attachment; for a
    /// collection child that schedules a load with `spawn_local`, so the call
    /// must then run inside a `tokio::task::LocalSet`.
    pub fn add_component(&self, child: Component, custom_name: Option<&str>) -> Component {
        if child.ptr_eq(self) {
            tracing::error!(component = %self.name(), "a component cannot be its own child");
            return child;
        }

        let name = custom_name.map(str::to_string).unwrap_or_else(|| child.name());

        if let Some(previous) = child.parent() {
            let previous_name = child.name();
            if !previous.ptr_eq(self) {
                tracing::debug!(
                    component = %name,
                    from = %previous.name(),
                    to = %self.name(),
                    "moving component to a new parent"
                );
                previous.remove_component(&previous_name);
            } else if previous_name != name {
                tracing::debug!(
                    component = %self.name(),
                    from = %previous_name,
                    to = %name,
                    "re-registering sub-component under a new name"
                );
                self.remove_component(&previous_name);
            }
        }

        let replaced = {
            let mut state = self.inner.state.borrow_mut();
            match state.children.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => Some(std::mem::replace(&mut slot.1, child.clone())),
                None => {
                    state.children.push((name.clone(), child.clone()));
                    None
                }
            }
        };
        if let Some(old) = replaced {
            if !old.ptr_eq(&child) {
                tracing::debug!(component = %self.name(), child = %name, "replacing sub-component");
            }
            self.detach(&name, &old);
        }

        {
            let mut state = child.inner.state.borrow_mut();
            state.name = name.clone();
            state.parent = Some(self.downgrade());
        }

        let parent = self.downgrade();
        self.inner
            .emitter
            .listen_to(child.emitter(), COMPONENT_SHOWN, move |data| {
                if let (Some(parent), Some(evt)) = (parent.upgrade(), data.component()) {
                    parent.handle_sub_component_shown(evt);
                }
            });

        self.sync_initial_visibility(&name, &child);
        child
    }

    /// Bring a freshly attached child's view in line with its `visible` option
    fn sync_initial_visibility(&self, name: &str, child: &Component) {
        let has_element = child.inner.view.borrow().as_ref().map(|view| view.has_element());
        if has_element == Some(false) {
            tracing::warn!(
                component = %self.name(),
                child = %name,
                "sub-component view has no root element; skipping visibility sync"
            );
        }

        let visible = flag(&child.inner.state.borrow().options, keys::VISIBLE);
        if visible {
            child.show(ShowOptions::silent());
        } else if has_element == Some(true) {
            if let Some(view) = child.inner.view.borrow_mut().as_mut() {
                view.set_element_visible(false);
            }
        }
    }

    /// Detach the child registered under `name` and hand it back.
    ///
    /// The child is not destructed; disposing of it is up to the caller.
    pub fn remove_component(&self, name: &str) -> Option<Component> {
        let child = {
            let mut state = self.inner.state.borrow_mut();
            let index = state.children.iter().position(|(n, _)| n == name)?;
            state.children.remove(index).1
        };
        self.detach(name, &child);
        Some(child)
    }

    /// Drop every link between this component and a child leaving the registry
    fn detach(&self, name: &str, child: &Component) {
        self.inner.emitter.stop_listening(Some(child.emitter()));

        let mut state = self.inner.state.borrow_mut();
        state.bubbled.remove(name);
        if state.current.as_ref().is_some_and(|c| c.points_to(child)) {
            state.current = None;
        }
        drop(state);

        let mut child_state = child.inner.state.borrow_mut();
        if child_state.parent.as_ref().is_some_and(|p| p.points_to(self)) {
            child_state.parent = None;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Singly coordination
    // ─────────────────────────────────────────────────────────────────────────

    /// React to a child announcing `component:shown`.
    ///
    /// Normally invoked by the subscription `add_component` sets up.
    pub fn handle_sub_component_shown(&self, evt: &ComponentEvent) {
        if self.is_singly() && !evt.component.is_overlay() {
            self.hide_all_sub_components(&[evt.name.as_str()]);
            self.inner.state.borrow_mut().current = Some(evt.component.downgrade());
        }

        self.trigger(SUB_COMPONENT_SHOWN, &EventData::Component(evt.clone()));
        self.show(ShowOptions::default());
    }

    pub fn show_all_sub_components(&self, except: &[&str]) {
        for (name, child) in self.children() {
            if !except.contains(&name.as_str()) {
                child.show(ShowOptions::default());
            }
        }
    }

    pub fn hide_all_sub_components(&self, except: &[&str]) {
        for (name, child) in self.children() {
            if !except.contains(&name.as_str()) {
                child.hide(HideOptions::default());
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bubbling
    // ─────────────────────────────────────────────────────────────────────────

    /// Re-emit `event` from this component whenever child `child_name` emits it.
    ///
    /// Registering the same (child, event) pair twice is a no-op.
    pub fn bubble(&self, child_name: &str, event: &str) -> bool {
        let Some(child) = self.child(child_name) else {
            tracing::error!(
                component = %self.name(),
                child = child_name,
                event,
                "cannot bubble event: no such sub-component"
            );
            return false;
        };

        let already = self
            .inner
            .state
            .borrow()
            .bubbled
            .get(child_name)
            .is_some_and(|relays| relays.contains_key(event));
        if already {
            tracing::debug!(component = %self.name(), child = child_name, event, "already bubbling");
            return true;
        }

        let parent = self.downgrade();
        let relayed = event.to_string();
        let id = self
            .inner
            .emitter
            .listen_to(child.emitter(), event, move |data| {
                if let Some(parent) = parent.upgrade() {
                    parent.trigger(&relayed, data);
                }
            });

        self.inner
            .state
            .borrow_mut()
            .bubbled
            .entry(child_name.to_string())
            .or_default()
            .insert(event.to_string(), id);
        true
    }

    /// Stop relaying `event` from child `child_name`
    pub fn unbubble(&self, child_name: &str, event: &str) -> bool {
        let id = {
            let mut state = self.inner.state.borrow_mut();
            let id = state
                .bubbled
                .get_mut(child_name)
                .and_then(|relays| relays.remove(event));
            if state.bubbled.get(child_name).is_some_and(|relays| relays.is_empty()) {
                state.bubbled.remove(child_name);
            }
            id
        };

        let Some(id) = id else {
            tracing::warn!(
                component = %self.name(),
                child = child_name,
                event,
                "unbubble: no relay registered"
            );
            return false;
        };

        if let Some(child) = self.child(child_name) {
            self.inner.emitter.stop_listening_to(child.emitter(), id);
        }
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Destruction
    // ─────────────────────────────────────────────────────────────────────────

    /// Tear the subtree down depth-first. The component is unusable afterwards.
    pub fn destruct(&self) {
        if self.is_destroyed() {
            return;
        }
        self.inner.state.borrow_mut().destroyed = true;

        let view = self.inner.view.borrow_mut().take();
        if let Some(mut view) = view {
            view.remove();
        }

        let children = std::mem::take(&mut self.inner.state.borrow_mut().children);
        for (_, child) in children {
            self.inner.emitter.stop_listening(Some(child.emitter()));
            child.destruct();
        }

        self.inner.emitter.stop_listening(None);
        self.inner.emitter.off_all();

        {
            let mut state = self.inner.state.borrow_mut();
            state.bubbled.clear();
            state.current = None;
        }
        *self.inner.hooks.borrow_mut() = Default::default();
        *self.inner.gate.borrow_mut() = None;
        self.set_flag(keys::VISIBLE, false);
        self.set_flag(keys::IS_SETUP, false);

        self.log_transition("destructed");
    }
}
