//! Component lifecycle and tree tests

use super::*;
use crate::events::{COMPONENT_HIDDEN, SUB_COMPONENT_SHOWN};
use crate::logging::{CaptureLayer, LogBuffer, LogLevel};
use crate::options::to_options;
use serde_json::json;
use std::cell::Cell;
use tracing_subscriber::layer::SubscriberExt;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// View that records every call it receives
struct RecordingView {
    calls: Rc<RefCell<Vec<String>>>,
    has_element: bool,
}

impl RecordingView {
    fn new() -> (Self, Rc<RefCell<Vec<String>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                calls: calls.clone(),
                has_element: true,
            },
            calls,
        )
    }

    fn without_element() -> (Self, Rc<RefCell<Vec<String>>>) {
        let (mut view, calls) = Self::new();
        view.has_element = false;
        (view, calls)
    }
}

impl View for RecordingView {
    fn render(&mut self) {
        self.calls.borrow_mut().push("render".into());
    }

    fn hide(&mut self) {
        self.calls.borrow_mut().push("hide".into());
    }

    fn has_element(&self) -> bool {
        self.has_element
    }

    fn set_element_visible(&mut self, visible: bool) {
        self.calls.borrow_mut().push(format!("element:{}", visible));
    }

    fn remove(&mut self) {
        self.calls.borrow_mut().push("remove".into());
    }
}

fn plain() -> Component {
    Component::new(ComponentClass::base(), Options::new())
}

fn with(options: serde_json::Value) -> Component {
    Component::new(ComponentClass::base(), to_options(options))
}

fn singly_parent() -> Component {
    with(json!({ "singly": true }))
}

fn counter(component: &Component, event: &str) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    component.on(event, move |_| c.set(c.get() + 1));
    count
}

fn capture<R>(f: impl FnOnce() -> R) -> (R, LogBuffer) {
    let buffer = LogBuffer::new();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(buffer.clone()));
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer)
}

// ─────────────────────────────────────────────────────────────────────────────
// Show / hide
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_show_then_hide_toggles_visibility() {
    let component = plain();
    assert!(!component.is_visible());

    component.show(ShowOptions::default());
    assert!(component.is_visible());
    assert_eq!(component.option(keys::VISIBLE), Some(json!(true)));

    assert!(component.hide(HideOptions::default()));
    assert!(!component.is_visible());
    assert_eq!(component.option(keys::VISIBLE), Some(json!(false)));
}

#[test]
fn test_hide_when_hidden_returns_false_and_emits_nothing() {
    let component = plain();
    let hidden = counter(&component, COMPONENT_HIDDEN);

    assert!(!component.hide(HideOptions::default()));
    assert_eq!(hidden.get(), 0);
}

#[test]
fn test_show_emits_before_state_changes() {
    let component = plain();
    let seen_visible = Rc::new(Cell::new(None));

    let weak = component.downgrade();
    let seen = seen_visible.clone();
    component.on(COMPONENT_SHOWN, move |_| {
        seen.set(weak.upgrade().map(|c| c.is_visible()));
    });

    component.show(ShowOptions::default());
    assert_eq!(seen_visible.get(), Some(false));
}

#[test]
fn test_repeated_show_renders_and_emits_again() {
    let (view, calls) = RecordingView::new();
    let component = Component::builder(ComponentClass::base()).view(view).build();
    let shown = counter(&component, COMPONENT_SHOWN);

    component.show(ShowOptions::default()).show(ShowOptions::default());

    assert_eq!(shown.get(), 2);
    assert_eq!(*calls.borrow(), vec!["render", "render"]);
}

#[test]
fn test_silent_transitions_emit_nothing() {
    let component = plain();
    let shown = counter(&component, COMPONENT_SHOWN);
    let hidden = counter(&component, COMPONENT_HIDDEN);

    component.show(ShowOptions::silent());
    assert!(component.hide(HideOptions::silent()));

    assert_eq!(shown.get(), 0);
    assert_eq!(hidden.get(), 0);
}

#[test]
fn test_setup_runs_once_per_visible_session() {
    let setups = Rc::new(Cell::new(0));
    let teardowns = Rc::new(Cell::new(0));
    let (s, t) = (setups.clone(), teardowns.clone());

    let component = Component::builder(ComponentClass::base())
        .on_setup(move |_| s.set(s.get() + 1))
        .on_teardown(move |_| t.set(t.get() + 1))
        .build();

    component.show(ShowOptions::default());
    component.show(ShowOptions::default());
    assert_eq!(setups.get(), 1);
    assert!(component.is_setup());
    assert_eq!(component.option(keys::IS_SETUP), Some(json!(true)));

    component.hide(HideOptions::default());
    assert_eq!(teardowns.get(), 1);
    assert!(!component.is_setup());

    component.show(ShowOptions::default());
    assert_eq!(setups.get(), 2);
}

#[test]
fn test_without_setup_hook_is_setup_stays_false() {
    let component = plain();
    component.show(ShowOptions::default());
    assert!(!component.is_setup());
    assert_eq!(component.option(keys::IS_SETUP), Some(json!(false)));
}

#[test]
fn test_hooks_may_drive_the_component() {
    let component = Component::builder(ComponentClass::base())
        .on_setup(|c| {
            c.trigger("ready", &EventData::Empty);
        })
        .build();
    let ready = counter(&component, "ready");

    component.show(ShowOptions::default());
    assert_eq!(ready.get(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_instance_options_overlay_class_chain() {
    let list = ComponentClass::base().extend("List", to_options(json!({ "singly": true, "pageSize": 10 })));
    let todo = list.extend("TodoList", to_options(json!({ "pageSize": 20, "filter": "open" })));

    let component = Component::new(
        todo,
        to_options(json!({ "filter": "done", "unknown": 1 })),
    );

    let options = component.options();
    assert_eq!(options["singly"], json!(true));
    assert_eq!(options["pageSize"], json!(20));
    assert_eq!(options["filter"], json!("done"));
    assert_eq!(options["visible"], json!(false));
    assert!(!options.contains_key("unknown"));

    let instance = component.instance_options();
    assert_eq!(instance["unknown"], json!(1));
    assert_eq!(instance["pageSize"], json!(20), "instance mapping is back-filled");

    assert_eq!(component.name(), "todoList");
    assert!(component.is_singly());
}

#[test]
fn test_nested_option_values_are_replaced_wholesale() {
    let class = ComponentClass::base().extend("Table", to_options(json!({ "columns": { "a": 1, "b": 2 } })));
    let component = Component::new(class, to_options(json!({ "columns": { "c": 3 } })));
    assert_eq!(component.options()["columns"], json!({ "c": 3 }));
}

#[test]
fn test_set_name_only_once_and_before_attachment() {
    let component = plain();
    assert!(component.set_name("sidebar").is_ok());
    assert_eq!(component.name(), "sidebar");
    assert_eq!(
        component.set_name("other"),
        Err(ComponentError::NameLocked {
            name: "sidebar".to_string()
        })
    );

    let parent = plain();
    let child = parent.add_component(plain(), Some("menu"));
    assert!(matches!(child.set_name("x"), Err(ComponentError::NameLocked { .. })));
    assert_eq!(child.name(), "menu");
}

// ─────────────────────────────────────────────────────────────────────────────
// Nesting
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_add_component_registers_and_links_parent() {
    let parent = plain();
    let child = parent.add_component(plain(), Some("list"));

    assert_eq!(parent.child_names(), vec!["list"]);
    assert!(parent.child("list").is_some_and(|c| c == child));
    assert!(child.parent().is_some_and(|p| p == parent));
}

#[test]
fn test_add_component_defaults_to_child_name() {
    let parent = plain();
    let class = ComponentClass::base().extend("StatusBar", Options::new());
    parent.add_component(Component::new(class, Options::new()), None);
    assert_eq!(parent.child_names(), vec!["statusBar"]);
}

#[test]
fn test_child_shown_propagates_to_all_ancestors() {
    let root = plain();
    let middle = root.add_component(plain(), Some("middle"));
    let leaf = middle.add_component(plain(), Some("leaf"));

    leaf.show(ShowOptions::default());

    assert!(leaf.is_visible());
    assert!(middle.is_visible());
    assert!(root.is_visible());
}

#[test]
fn test_sub_component_shown_carries_child() {
    let parent = plain();
    let child = parent.add_component(plain(), Some("detail"));

    let received = Rc::new(RefCell::new(None));
    let r = received.clone();
    parent.on(SUB_COMPONENT_SHOWN, move |data| {
        *r.borrow_mut() = data.component().map(|evt| (evt.name.clone(), evt.component.clone()));
    });

    child.show(ShowOptions::default());

    let (name, component) = received.borrow_mut().take().expect("subComponent:shown fired");
    assert_eq!(name, "detail");
    assert_eq!(component, child);
}

#[test]
fn test_visible_option_shows_child_silently_on_add() {
    let setups = Rc::new(Cell::new(0));
    let s = setups.clone();
    let child = Component::builder(ComponentClass::base())
        .option("visible", true)
        .on_setup(move |_| s.set(s.get() + 1))
        .build();

    let parent = plain();
    let relayed = counter(&parent, SUB_COMPONENT_SHOWN);
    parent.add_component(child.clone(), Some("panel"));

    assert!(child.is_visible());
    assert_eq!(setups.get(), 1);
    assert_eq!(relayed.get(), 0, "silent show does not reach the parent");
    assert!(!parent.is_visible());
}

#[test]
fn test_hidden_child_element_is_hidden_on_add() {
    let (view, calls) = RecordingView::new();
    let child = Component::builder(ComponentClass::base()).view(view).build();

    plain().add_component(child, Some("panel"));
    assert_eq!(*calls.borrow(), vec!["element:false"]);
}

#[test]
fn test_view_without_element_is_warned_about() {
    let (view, calls) = RecordingView::without_element();
    let child = Component::builder(ComponentClass::base()).view(view).build();
    let parent = plain();

    let (_, logs) = capture(|| {
        parent.add_component(child, Some("ghost"));
    });

    assert_eq!(parent.child_names(), vec!["ghost"]);
    assert!(calls.borrow().is_empty());
    let warnings = logs.at_level(LogLevel::Warn);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field("child"), Some("ghost"));
}

#[test]
fn test_same_name_replaces_previous_child() {
    let parent = plain();
    let old = parent.add_component(plain(), Some("slot"));
    let new = parent.add_component(plain(), Some("slot"));

    assert_eq!(parent.children().len(), 1);
    assert!(parent.child("slot").is_some_and(|c| c == new));
    assert!(old.parent().is_none());

    old.show(ShowOptions::default());
    assert!(!parent.is_visible(), "replaced child no longer relays");
}

#[test]
fn test_adding_to_another_parent_moves_child() {
    let first = plain();
    let second = plain();
    let child = first.add_component(plain(), Some("item"));

    second.add_component(child.clone(), Some("item"));

    assert!(first.child("item").is_none());
    assert!(child.parent().is_some_and(|p| p == second));

    child.show(ShowOptions::default());
    assert!(second.is_visible());
    assert!(!first.is_visible());
}

#[test]
fn test_re_adding_under_new_name_moves_the_registration() {
    let parent = plain();
    let child = parent.add_component(plain(), Some("a"));
    parent.bubble("a", "ping");
    let shown = counter(&parent, SUB_COMPONENT_SHOWN);
    let pings = counter(&parent, "ping");

    parent.add_component(child.clone(), Some("b"));

    assert_eq!(parent.child_names(), vec!["b"]);
    assert_eq!(child.name(), "b");
    assert!(child.parent().is_some_and(|p| p == parent));
    assert!(parent.bubbled_events("a").is_empty());

    child.show(ShowOptions::default());
    assert_eq!(shown.get(), 1, "one subscription survives the rename");

    child.trigger("ping", &EventData::Empty);
    assert_eq!(pings.get(), 0, "relays registered under the old name are dropped");
}

#[test]
fn test_remove_component_hands_child_back() {
    let parent = plain();
    parent.add_component(plain(), Some("row"));

    let removed = parent.remove_component("row").expect("child was registered");
    assert!(parent.child("row").is_none());
    assert!(removed.parent().is_none());
    assert!(!removed.is_destroyed());

    assert!(parent.remove_component("row").is_none());
}

#[test]
fn test_remove_then_add_keeps_no_stale_relays() {
    let parent = plain();
    let child = parent.add_component(plain(), Some("row"));
    parent.bubble("row", "ping");
    let pings = counter(&parent, "ping");

    parent.remove_component("row");
    child.trigger("ping", &EventData::Empty);
    child.show(ShowOptions::default());
    assert_eq!(pings.get(), 0);
    assert!(!parent.is_visible());

    child.hide(HideOptions::default());
    parent.add_component(child.clone(), Some("row"));
    assert!(parent.bubbled_events("row").is_empty());

    child.trigger("ping", &EventData::Empty);
    assert_eq!(pings.get(), 0);

    child.show(ShowOptions::default());
    assert!(parent.is_visible());
    assert_eq!(parent.emitter().listening_count(), 1);
}

#[test]
fn test_show_and_hide_all_respect_exceptions() {
    let parent = plain();
    let a = parent.add_component(plain(), Some("a"));
    let b = parent.add_component(plain(), Some("b"));
    let c = parent.add_component(plain(), Some("c"));

    parent.show_all_sub_components(&["b"]);
    assert!(a.is_visible() && !b.is_visible() && c.is_visible());

    parent.hide_all_sub_components(&["c"]);
    assert!(!a.is_visible() && c.is_visible());
}

// ─────────────────────────────────────────────────────────────────────────────
// Singly mode
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_singly_keeps_one_child_visible() {
    let parent = singly_parent();
    let a = parent.add_component(plain(), Some("a"));
    let b = parent.add_component(plain(), Some("b"));

    a.show(ShowOptions::default());
    assert!(parent.current_sub_component().is_some_and(|c| c == a));

    b.show(ShowOptions::default());
    assert!(!a.is_visible());
    assert!(b.is_visible());
    assert!(parent.current_sub_component().is_some_and(|c| c == b));
}

#[test]
fn test_overlay_is_exempt_from_singly() {
    let parent = singly_parent();
    let a = parent.add_component(plain(), Some("a"));
    let modal = parent.add_component(with(json!({ "overlay": true })), Some("modal"));

    a.show(ShowOptions::default());
    modal.show(ShowOptions::default());

    assert!(a.is_visible());
    assert!(modal.is_visible());
    assert!(parent.current_sub_component().is_some_and(|c| c == a));
}

#[test]
fn test_non_singly_parent_tracks_no_current() {
    let parent = plain();
    let a = parent.add_component(plain(), Some("a"));
    let b = parent.add_component(plain(), Some("b"));

    a.show(ShowOptions::default());
    b.show(ShowOptions::default());

    assert!(a.is_visible() && b.is_visible());
    assert!(parent.current_sub_component().is_none());
}

#[test]
fn test_removing_current_clears_it() {
    let parent = singly_parent();
    let a = parent.add_component(plain(), Some("a"));
    a.show(ShowOptions::default());

    parent.remove_component("a");
    assert!(parent.current_sub_component().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Bubbling
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_bubble_relays_payload() {
    let parent = plain();
    let child = parent.add_component(plain(), Some("form"));
    assert!(parent.bubble("form", "submit"));

    let received = Rc::new(RefCell::new(Vec::new()));
    let r = received.clone();
    parent.on("submit", move |data| r.borrow_mut().extend_from_slice(data.args()));

    child.trigger("submit", &EventData::Args(vec![json!({ "title": "milk" })]));
    assert_eq!(*received.borrow(), vec![json!({ "title": "milk" })]);
}

#[test]
fn test_bubble_is_idempotent() {
    let parent = plain();
    let child = parent.add_component(plain(), Some("form"));
    parent.bubble("form", "submit");
    parent.bubble("form", "submit");

    let submits = counter(&parent, "submit");
    child.trigger("submit", &EventData::Empty);

    assert_eq!(submits.get(), 1);
    assert_eq!(parent.bubbled_events("form"), vec!["submit"]);
}

#[test]
fn test_unbubble_stops_relay() {
    let parent = plain();
    let child = parent.add_component(plain(), Some("form"));
    parent.bubble("form", "submit");
    parent.bubble("form", "cancel");
    let submits = counter(&parent, "submit");
    let cancels = counter(&parent, "cancel");

    assert!(parent.unbubble("form", "submit"));
    child.trigger("submit", &EventData::Empty);
    child.trigger("cancel", &EventData::Empty);

    assert_eq!(submits.get(), 0);
    assert_eq!(cancels.get(), 1);
    assert_eq!(parent.bubbled_events("form"), vec!["cancel"]);
}

#[test]
fn test_bubble_missing_child_logs_error() {
    let parent = plain();
    let (ok, logs) = capture(|| parent.bubble("nope", "submit"));

    assert!(!ok);
    let errors = logs.at_level(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("child"), Some("nope"));
}

#[test]
fn test_unbubble_without_relay_warns() {
    let parent = plain();
    parent.add_component(plain(), Some("form"));

    let (ok, logs) = capture(|| parent.unbubble("form", "submit"));

    assert!(!ok);
    assert_eq!(logs.at_level(LogLevel::Warn).len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Debug logging
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_debug_option_logs_transitions() {
    let component = with(json!({ "debug": true }));
    component.set_name("inbox").unwrap();

    let (_, logs) = capture(|| {
        component.show(ShowOptions::default());
    });

    let debug: Vec<_> = logs.at_level(LogLevel::Debug);
    assert!(debug
        .iter()
        .any(|e| e.message == "shown" && e.field("component") == Some("inbox")));
    assert!(debug.iter().any(|e| e.field("event") == Some(COMPONENT_SHOWN)));
}

#[test]
fn test_transitions_log_at_trace_without_debug_option() {
    let component = plain();
    let (_, logs) = capture(|| {
        component.show(ShowOptions::default());
    });

    assert!(logs.at_level(LogLevel::Debug).is_empty());
    assert_eq!(logs.at_level(LogLevel::Trace).len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Destruction & snapshots
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_destruct_cascades_depth_first() {
    let (root_view, root_calls) = RecordingView::new();
    let (leaf_view, leaf_calls) = RecordingView::new();

    let root = Component::builder(ComponentClass::base()).view(root_view).build();
    let middle = root.add_component(plain(), Some("middle"));
    let leaf = middle.add_component(
        Component::builder(ComponentClass::base()).view(leaf_view).build(),
        Some("leaf"),
    );
    root.bubble("middle", "ping");
    let pings = counter(&root, "ping");

    root.destruct();

    assert!(root.is_destroyed() && middle.is_destroyed() && leaf.is_destroyed());
    assert!(root.children().is_empty());
    assert!(middle.children().is_empty());
    assert_eq!(root_calls.borrow().last().map(String::as_str), Some("remove"));
    assert_eq!(leaf_calls.borrow().last().map(String::as_str), Some("remove"));
    assert!(!root.has_view());

    middle.trigger("ping", &EventData::Empty);
    assert_eq!(pings.get(), 0);
    assert_eq!(root.emitter().listening_count(), 0);
}

#[test]
fn test_show_after_destruct_is_ignored() {
    let component = plain();
    component.destruct();

    let (_, logs) = capture(|| {
        component.show(ShowOptions::default());
    });

    assert!(!component.is_visible());
    assert_eq!(logs.at_level(LogLevel::Warn).len(), 1);
}

#[test]
fn test_destructed_component_is_hidden() {
    let component = plain();
    component.show(ShowOptions::default());
    component.destruct();

    assert!(!component.is_visible());
    assert!(!component.hide(HideOptions::default()));
}

#[test]
fn test_snapshot_describes_tree() {
    let root = singly_parent();
    root.set_name("app").unwrap();
    let class = ComponentClass::base().extend("TodoList", Options::new());
    let list = root.add_component(Component::new(class, Options::new()), None);
    root.add_component(plain(), Some("footer"));

    list.show(ShowOptions::default());

    let snapshot = serde_json::to_value(root.snapshot()).unwrap();
    assert_eq!(
        snapshot,
        json!({
            "name": "app",
            "class": "Component",
            "visible": true,
            "is_setup": false,
            "current": "todoList",
            "children": [
                { "name": "todoList", "class": "TodoList", "visible": true, "is_setup": false },
                { "name": "footer", "class": "Component", "visible": false, "is_setup": false },
            ]
        })
    );
}

#[test]
fn test_dropping_parent_does_not_leak_through_relays() {
    let parent = plain();
    let child = parent.add_component(plain(), Some("child"));
    parent.bubble("child", "ping");

    let weak = parent.downgrade();
    drop(parent);

    assert!(weak.upgrade().is_none());
    assert!(child.parent().is_none());
    // Relay closures only hold weak handles
    assert_eq!(child.trigger("ping", &EventData::Empty), 1);
}
