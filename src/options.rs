//! Option mappings and class-level defaults
//!
//! A component's effective options come from two places:
//!
//! 1. **Class chain**: every [`ComponentClass`] declares a default mapping.
//!    The chain is folded base-first, so a derived class overrides the keys it
//!    redeclares and inherits the rest. The fold is computed once when the
//!    class is created and cached on it.
//! 2. **Instance options**: recognized keys (keys present in the folded
//!    defaults) overwrite the defaults. Unknown keys never reach the effective
//!    options.
//!
//! The merge is one level deep: a nested mapping value replaces the default
//! wholesale instead of being merged key by key.

use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// String-keyed option mapping
pub type Options = serde_json::Map<String, Value>;

/// Well-known option keys
pub mod keys {
    /// At most one non-overlay child visible at a time
    pub const SINGLY: &str = "singly";
    /// Initial visibility; mirrors the runtime flag afterwards
    pub const VISIBLE: &str = "visible";
    /// Log lifecycle transitions and emitted events at debug level
    pub const DEBUG: &str = "debug";
    /// Exempt from the parent's singly exclusivity
    pub const OVERLAY: &str = "overlay";
    /// Runtime flag mirrored from the setup state
    pub const IS_SETUP: &str = "isSetup";
    /// Fetch parameters every collection load starts from
    pub const DEFAULT_PARAMS: &str = "defaultParams";
}

// ─────────────────────────────────────────────────────────────────────────────
// Component classes
// ─────────────────────────────────────────────────────────────────────────────

/// A level in the component class hierarchy
///
/// ```
/// use trellis::options::{ComponentClass, keys};
/// use serde_json::json;
///
/// let list = ComponentClass::base().extend(
///     "TodoList",
///     trellis::options::to_options(json!({ "singly": true, "pageSize": 20 })),
/// );
/// let merged = list.merge_options();
/// assert_eq!(merged[keys::SINGLY], json!(true));
/// assert_eq!(merged[keys::VISIBLE], json!(false)); // inherited from the base
/// assert_eq!(list.default_name(), "todoList");
/// ```
#[derive(Debug)]
pub struct ComponentClass {
    tag: String,
    parent: Option<Arc<ComponentClass>>,
    defaults: Options,
    merged: Options,
}

static BASE_CLASS: OnceLock<Arc<ComponentClass>> = OnceLock::new();

impl ComponentClass {
    /// Root of every hierarchy: the plain `Component` class
    pub fn base() -> Arc<ComponentClass> {
        BASE_CLASS
            .get_or_init(|| {
                let defaults = base_defaults();
                let merged = fold_defaults([&defaults]);
                Arc::new(ComponentClass {
                    tag: "Component".to_string(),
                    parent: None,
                    defaults,
                    merged,
                })
            })
            .clone()
    }

    /// Derive a new class from this one with its own default mapping
    pub fn extend(self: &Arc<Self>, tag: impl Into<String>, defaults: Options) -> Arc<ComponentClass> {
        let merged = {
            let chain = self.chain();
            fold_defaults(chain.iter().map(|class| &class.defaults).chain([&defaults]))
        };

        Arc::new(ComponentClass {
            tag: tag.into(),
            parent: Some(Arc::clone(self)),
            defaults,
            merged,
        })
    }

    /// Type tag, e.g. `"TodoList"`
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn parent(&self) -> Option<&Arc<ComponentClass>> {
        self.parent.as_ref()
    }

    /// Defaults declared at this level only
    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    /// Every class from the root ancestor down to this one
    pub fn chain(&self) -> Vec<&ComponentClass> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent.as_deref() {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Effective defaults of this class (the cached fold of the chain)
    pub fn merge_options(&self) -> Options {
        self.merged.clone()
    }

    /// Overlay instance options onto this class's defaults (see [`apply_options`])
    pub fn apply_options(&self, instance: &mut Options) -> Options {
        apply_options(&self.merged, instance)
    }

    /// Name a component of this class gets unless told otherwise
    pub fn default_name(&self) -> String {
        decapitalize(&self.tag)
    }

    /// Whether `tag` names this class or one of its ancestors
    pub fn is_a(&self, tag: &str) -> bool {
        self.chain().iter().any(|class| class.tag == tag)
    }
}

fn base_defaults() -> Options {
    let mut defaults = Options::new();
    defaults.insert(keys::SINGLY.to_string(), Value::Bool(false));
    defaults.insert(keys::VISIBLE.to_string(), Value::Bool(false));
    defaults.insert(keys::DEBUG.to_string(), Value::Bool(false));
    defaults.insert(keys::OVERLAY.to_string(), Value::Bool(false));
    defaults
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Fold default mappings left to right; later mappings win on shared keys
pub fn fold_defaults<'a>(levels: impl IntoIterator<Item = &'a Options>) -> Options {
    levels.into_iter().fold(Options::new(), |mut acc, level| {
        for (key, value) in level {
            acc.insert(key.clone(), value.clone());
        }
        acc
    })
}

/// Overlay `instance` onto `defaults`.
///
/// Keys of `instance` that `defaults` does not know are dropped from the
/// returned effective options but stay in `instance`, which is then
/// back-filled with every effective option.
pub fn apply_options(defaults: &Options, instance: &mut Options) -> Options {
    let mut effective = defaults.clone();
    for (key, value) in instance.iter() {
        if let Some(slot) = effective.get_mut(key) {
            *slot = value.clone();
        }
    }

    for (key, value) in &effective {
        instance.insert(key.clone(), value.clone());
    }
    effective
}

/// Shallow merge: every key of `overlay` replaces the same key of `base`
pub fn merge(base: &Options, overlay: &Options) -> Options {
    fold_defaults([base, overlay])
}

/// Convert a JSON value into an option mapping (non-objects become empty)
pub fn to_options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        _ => Options::new(),
    }
}

/// Read a boolean option; missing or non-boolean values count as false
pub fn flag(options: &Options, key: &str) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// `"TodoList"` -> `"todoList"`
pub fn decapitalize(tag: &str) -> String {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
