//! View collaborator contract
//!
//! Components never draw anything themselves. When a component has a view,
//! lifecycle transitions are forwarded to it:
//!
//! | Component            | View                           |
//! |----------------------|--------------------------------|
//! | `show`               | `show` (render entry point)    |
//! | `hide`               | `hide`                         |
//! | `render`             | `render`                       |
//! | `add_component` sync | `set_element_visible(false)`   |
//! | `destruct`           | `remove`                       |

/// Minimal rendering contract a component drives
pub trait View {
    /// Draw (or redraw) the view's contents
    fn render(&mut self);

    /// Make the view visible. Defaults to a plain render.
    fn show(&mut self) {
        self.render();
    }

    /// Make the view invisible
    fn hide(&mut self);

    /// Whether the view has a root element to toggle
    fn has_element(&self) -> bool;

    /// Toggle the root element's display without a full show/hide
    fn set_element_visible(&mut self, visible: bool);

    /// Release everything the view holds. Called once, when its owner is destructed.
    fn remove(&mut self) {}
}

/// A view that only reports what it was asked to do through `tracing`
///
/// Used by layouts run from the command line, where there is nothing to draw
/// but the call sequence is worth seeing.
#[derive(Debug, Clone)]
pub struct TracingView {
    label: String,
    has_element: bool,
    element_visible: bool,
    renders: usize,
}

impl TracingView {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            has_element: true,
            element_visible: true,
            renders: 0,
        }
    }

    /// A view whose root element is missing
    pub fn detached(label: impl Into<String>) -> Self {
        Self {
            has_element: false,
            element_visible: false,
            ..Self::new(label)
        }
    }

    pub fn renders(&self) -> usize {
        self.renders
    }

    pub fn is_element_visible(&self) -> bool {
        self.element_visible
    }
}

impl View for TracingView {
    fn render(&mut self) {
        self.renders += 1;
        tracing::debug!(view = %self.label, renders = self.renders, "render");
    }

    fn show(&mut self) {
        self.element_visible = self.has_element;
        self.render();
    }

    fn hide(&mut self) {
        self.element_visible = false;
        tracing::debug!(view = %self.label, "hide");
    }

    fn has_element(&self) -> bool {
        self.has_element
    }

    fn set_element_visible(&mut self, visible: bool) {
        if self.has_element {
            self.element_visible = visible;
            tracing::trace!(view = %self.label, visible, "element toggled");
        }
    }

    fn remove(&mut self) {
        self.has_element = false;
        self.element_visible = false;
        tracing::debug!(view = %self.label, "removed");
    }
}
