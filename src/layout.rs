// Layout module - declarative component trees and scripted steps
//
// A layout file is TOML with three parts:
// - `[[classes]]`: component classes, each extending a built-in or an
//   earlier declared class with its own default options
// - `[root]`: the component tree (nested through `[[root.children]]`)
// - `[[steps]]`: actions run against the tree, addressed by dotted paths of
//   child names below the root ("" is the root itself)
//
// Example:
//
//   [[classes]]
//   tag = "Page"
//   defaults = { singly = true }
//
//   [root]
//   name = "app"
//   class = "Page"
//
//   [[root.children]]
//   name = "inbox"
//   collection = { source = "memory", items = [{ subject = "hi" }] }
//
//   [[steps]]
//   action = "show"
//   target = "inbox"

use crate::collection::{CollectionComponent, CollectionSource, HttpSource, MemorySource};
use crate::component::{Component, HideOptions, ShowOptions, TracingView};
use crate::config::Config;
use crate::events::EventData;
use crate::options::{ComponentClass, Options};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

/// Tag of the built-in base class
const BASE_TAG: &str = "Component";

/// Tag of the built-in collection class
const COLLECTION_TAG: &str = "CollectionComponent";

// ─────────────────────────────────────────────────────────────────────────────
// File format
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed layout file
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutFile {
    #[serde(default)]
    pub classes: Vec<ClassSpec>,
    pub root: NodeSpec,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A class declaration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassSpec {
    pub tag: String,
    /// Parent class tag; must be built in or declared earlier
    #[serde(default = "default_extends")]
    pub extends: String,
    #[serde(default)]
    pub defaults: Options,
}

fn default_extends() -> String {
    BASE_TAG.to_string()
}

/// A node of the component tree
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    /// Registry name; defaults to the decapitalized class tag
    pub name: Option<String>,
    /// Class tag; defaults to `Component`, or `CollectionComponent` for nodes
    /// with a collection
    pub class: Option<String>,
    #[serde(default)]
    pub options: Options,
    pub view: Option<ViewKind>,
    pub collection: Option<SourceSpec>,
    #[serde(default)]
    pub bubble: Vec<BubbleSpec>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// A view that logs every call
    Tracing,
    /// A tracing view without a root element
    Detached,
}

/// Where a collection node fetches its models
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SourceSpec {
    /// Fixed models, sorted and limited by the `sort` / `limit` params
    Memory {
        #[serde(default)]
        items: Vec<Value>,
    },
    /// JSON endpoint queried with the params as query string
    Http { url: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct BubbleSpec {
    pub child: String,
    pub event: String,
}

/// One scripted action
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Step {
    Show {
        target: String,
        #[serde(default)]
        params: Option<Options>,
        #[serde(default)]
        silent: bool,
    },
    Hide {
        target: String,
        #[serde(default)]
        silent: bool,
    },
    /// Detach the target from its parent and destruct it
    Remove { target: String },
    Trigger {
        target: String,
        event: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Await a collection load on the target
    Load {
        target: String,
        #[serde(default)]
        params: Option<Options>,
    },
    Refresh { target: String },
    /// Wait for every deferred collection load
    Settle,
}

impl LayoutFile {
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse layout")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid layout {}", path.display()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built layout
// ─────────────────────────────────────────────────────────────────────────────

/// A component tree built from a [`LayoutFile`]
pub struct Layout {
    root: Component,
    /// Collection components by path
    collections: HashMap<String, CollectionComponent>,
}

/// Join a parent path and a child name
fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

struct Builder<'a> {
    classes: HashMap<String, Arc<ComponentClass>>,
    config: &'a Config,
    collections: HashMap<String, CollectionComponent>,
}

impl Builder<'_> {
    fn register_classes(&mut self, specs: &[ClassSpec]) -> Result<()> {
        for spec in specs {
            if self.classes.contains_key(&spec.tag) {
                bail!("class '{}' is declared twice", spec.tag);
            }
            let parent = self.classes.get(&spec.extends).ok_or_else(|| {
                anyhow!(
                    "class '{}' extends unknown class '{}' (declare it first)",
                    spec.tag,
                    spec.extends
                )
            })?;
            let class = parent.extend(spec.tag.clone(), spec.defaults.clone());
            self.classes.insert(spec.tag.clone(), class);
        }
        Ok(())
    }

    fn source(&self, spec: &SourceSpec) -> Result<Rc<dyn CollectionSource>> {
        let source: Rc<dyn CollectionSource> = match spec {
            SourceSpec::Memory { items } => Rc::new(MemorySource::sorted(items.clone())),
            SourceSpec::Http { url } => Rc::new(HttpSource::new(url.clone(), &self.config.http)?),
        };
        Ok(source)
    }

    /// Build `spec` and its subtree; `path` is where it will be attached
    fn node(&mut self, spec: &NodeSpec, path: &str) -> Result<Component> {
        let tag = class_tag(spec);
        let class = self
            .classes
            .get(tag)
            .cloned()
            .ok_or_else(|| anyhow!("{}: unknown class '{}'", display_path(path), tag))?;

        let mut builder = Component::builder(class).options(spec.options.clone());
        if let Some(kind) = spec.view {
            let label = display_path(path).to_string();
            builder = builder.view(match kind {
                ViewKind::Tracing => TracingView::new(label),
                ViewKind::Detached => TracingView::detached(label),
            });
        }

        let component = match &spec.collection {
            Some(source) => {
                let collection = CollectionComponent::from_builder(builder, self.source(source)?);
                let component = collection.component().clone();
                self.collections.insert(path.to_string(), collection);
                component
            }
            None => builder.build(),
        };

        for child_spec in &spec.children {
            let name = match &child_spec.name {
                Some(name) => name.clone(),
                None => self.default_name(child_spec)?,
            };
            let child = self.node(child_spec, &child_path(path, &name))?;
            component.add_component(child, Some(&name));
        }

        for relay in &spec.bubble {
            if !component.bubble(&relay.child, &relay.event) {
                bail!(
                    "{}: cannot bubble '{}' from missing child '{}'",
                    display_path(path),
                    relay.event,
                    relay.child
                );
            }
        }

        Ok(component)
    }

    fn default_name(&self, spec: &NodeSpec) -> Result<String> {
        let tag = class_tag(spec);
        self.classes
            .get(tag)
            .map(|class| class.default_name())
            .ok_or_else(|| anyhow!("unknown class '{}'", tag))
    }
}

fn class_tag(spec: &NodeSpec) -> &str {
    match (&spec.class, &spec.collection) {
        (Some(tag), _) => tag,
        (None, Some(_)) => COLLECTION_TAG,
        (None, None) => BASE_TAG,
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

impl Layout {
    /// Build the component tree described by `file`
    pub fn build(file: &LayoutFile, config: &Config) -> Result<Self> {
        let mut builder = Builder {
            classes: HashMap::from([
                (BASE_TAG.to_string(), ComponentClass::base()),
                (COLLECTION_TAG.to_string(), CollectionComponent::class()),
            ]),
            config,
            collections: HashMap::new(),
        };
        builder.register_classes(&file.classes)?;

        let root = builder.node(&file.root, "")?;
        if let Some(name) = &file.root.name {
            root.set_name(name.clone())?;
        }

        tracing::debug!(
            root = %root.name(),
            collections = builder.collections.len(),
            "layout built"
        );

        Ok(Self {
            root,
            collections: builder.collections,
        })
    }

    pub fn root(&self) -> &Component {
        &self.root
    }

    /// Component at a dotted path of child names below the root
    pub fn resolve(&self, path: &str) -> Result<Component> {
        if path.is_empty() {
            return Ok(self.root.clone());
        }
        let mut current = self.root.clone();
        for segment in path.split('.') {
            current = current
                .child(segment)
                .ok_or_else(|| anyhow!("no component at '{}' (missing '{}')", path, segment))?;
        }
        Ok(current)
    }

    /// Collection component at `path`
    pub fn collection(&self, path: &str) -> Result<&CollectionComponent> {
        self.collections
            .get(path)
            .ok_or_else(|| anyhow!("no collection component at '{}'", display_path(path)))
    }

    /// Run `steps` in order, stopping at the first failing one
    pub async fn run(&mut self, steps: &[Step]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            self.step(step)
                .await
                .with_context(|| format!("step {} ({:?}) failed", index + 1, step))?;
        }
        Ok(())
    }

    async fn step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Show {
                target,
                params,
                silent,
            } => {
                tracing::info!(path = %display_path(target), "show");
                self.resolve(target)?.show(ShowOptions {
                    silent: *silent,
                    params: params.clone(),
                });
            }
            Step::Hide { target, silent } => {
                tracing::info!(path = %display_path(target), "hide");
                if !self.resolve(target)?.hide(HideOptions { silent: *silent }) {
                    tracing::debug!(path = %display_path(target), "already hidden");
                }
            }
            Step::Remove { target } => {
                let Some((parent_path, name)) = split_last(target) else {
                    bail!("the root cannot be removed");
                };
                let parent = self.resolve(parent_path)?;
                let removed = parent
                    .remove_component(name)
                    .ok_or_else(|| anyhow!("no component at '{}'", target))?;
                removed.destruct();
                let prefix = format!("{}.", target);
                self.collections
                    .retain(|path, _| path != target && !path.starts_with(&prefix));
                tracing::info!(path = %target, "removed");
            }
            Step::Trigger {
                target,
                event,
                args,
            } => {
                let delivered = self
                    .resolve(target)?
                    .trigger(event, &EventData::Args(args.clone()));
                tracing::info!(path = %display_path(target), event = %event, delivered, "trigger");
            }
            Step::Load { target, params } => {
                let outcome = self.collection(target)?.load(params.clone()).await?;
                tracing::info!(path = %display_path(target), ?outcome, "load");
            }
            Step::Refresh { target } => {
                let outcome = self.collection(target)?.refresh().await?;
                tracing::info!(path = %display_path(target), ?outcome, "refresh");
            }
            Step::Settle => self.settle().await,
        }
        Ok(())
    }

    /// Wait for every load scheduled by deferred shows
    pub async fn settle(&self) {
        for collection in self.collections.values() {
            collection.settle().await;
        }
    }
}

/// `"a.b.c"` -> `("a.b", "c")`, `"a"` -> `("", "a")`, `""` -> None
fn split_last(path: &str) -> Option<(&str, &str)> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('.').unwrap_or(("", path)))
}
