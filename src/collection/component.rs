//! Component whose visibility waits for its collection
//!
//! # Show behavior
//!
//! | Call                              | Effect                                      |
//! |-----------------------------------|---------------------------------------------|
//! | `show` with params                | load(params), show once applied             |
//! | `show` without params, not loaded | refresh(), show once applied                |
//! | `show` without params, loaded     | plain show                                  |
//!
//! Deferred shows spawn their load with `tokio::task::spawn_local`, so a
//! collection component must live inside a `tokio::task::LocalSet`.
//!
//! # Overlapping loads
//!
//! Every load takes a new generation number when it starts. A load that
//! completes after a newer one was issued is discarded
//! ([`LoadOutcome::Superseded`]): it neither resets the collection nor emits
//! `collectionLoaded`. A pending deferred show is fulfilled by whichever load
//! applies first.

use super::{Collection, CollectionSource, LoadError};
use crate::component::{Component, ComponentBuilder, Gate, ShowGate, ShowOptions};
use crate::events::{EventData, COLLECTION_ERROR, COLLECTION_LOADED, RESET};
use crate::options::{keys, merge, to_options, ComponentClass, Options};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

static COLLECTION_CLASS: OnceLock<Arc<ComponentClass>> = OnceLock::new();

/// What happened to a load's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The models replaced the collection's contents
    Applied,
    /// A newer load was issued meanwhile (or the component was destructed);
    /// the result was discarded
    Superseded,
}

/// Load bookkeeping shared between the handle and the component's show gate
struct LoadState {
    collection: Collection,
    default_params: Options,
    params: RefCell<Options>,
    loaded: Cell<bool>,
    /// Generation of the most recently issued load
    generation: Cell<u64>,
    /// Loads scheduled or running
    in_flight: Cell<usize>,
    /// Show waiting for the next applied load
    pending_show: RefCell<Option<ShowOptions>>,
    /// Deferred loads not yet finished (pruned on every push)
    tasks: RefCell<Vec<JoinHandle<()>>>,
}

impl LoadState {
    async fn load(&self, component: &Component, params: Option<Options>) -> Result<LoadOutcome, LoadError> {
        let effective = merge(&self.default_params, &params.unwrap_or_default());
        *self.params.borrow_mut() = effective.clone();

        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let logged_params = serde_json::Value::Object(effective.clone());
        tracing::debug!(
            component = %component.name(),
            source = %self.collection.source().describe(),
            generation,
            params = %logged_params,
            "loading collection"
        );

        let fetch = self.collection.fetch(&effective);
        let result = fetch.await;

        if generation != self.generation.get() || component.is_destroyed() {
            tracing::debug!(component = %component.name(), generation, "discarding superseded load");
            return Ok(LoadOutcome::Superseded);
        }

        let models = result?;
        self.collection.reset(models);
        component.trigger(COLLECTION_LOADED, &EventData::Empty);
        self.loaded.set(true);

        let pending = self.pending_show.borrow_mut().take();
        if let Some(options) = pending {
            component.show_now(&options);
        }
        Ok(LoadOutcome::Applied)
    }

    /// Schedule a load on the local task set and show once it applies
    fn defer(self: &Rc<Self>, component: &Component, options: &ShowOptions, params: Option<Options>) {
        *self.pending_show.borrow_mut() = Some(ShowOptions {
            silent: options.silent,
            params: None,
        });
        self.in_flight.set(self.in_flight.get() + 1);

        let state = Rc::clone(self);
        let component = component.clone();
        let handle = tokio::task::spawn_local(async move {
            let result = state.load(&component, params).await;
            state.in_flight.set(state.in_flight.get() - 1);

            if let Err(e) = result {
                tracing::warn!(component = %component.name(), error = %e, "deferred collection load failed");
                component.trigger(COLLECTION_ERROR, &EventData::Args(vec![json!(e.to_string())]));
            }
        });
        let mut tasks = self.tasks.borrow_mut();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }
}

impl ShowGate for LoadState {
    fn intercept(self: Rc<Self>, component: &Component, options: &ShowOptions) -> Gate {
        if let Some(params) = &options.params {
            self.defer(component, options, Some(params.clone()));
            return Gate::Deferred;
        }

        if !self.loaded.get() {
            if self.in_flight.get() > 0 {
                // A load is already on its way; just wait for it
                *self.pending_show.borrow_mut() = Some(options.clone());
            } else {
                let params = self.params.borrow().clone();
                self.defer(component, options, Some(params));
            }
            return Gate::Deferred;
        }

        Gate::Proceed
    }
}

/// A component gated on its collection having loaded at least once
///
/// The wrapped [`Component`] carries the gate, so a parent driving the plain
/// handle (e.g. through `show_all_sub_components`) gets the same behavior.
#[derive(Clone)]
pub struct CollectionComponent {
    component: Component,
    state: Rc<LoadState>,
}

impl CollectionComponent {
    /// Base class of collection components; declares `defaultParams`
    pub fn class() -> Arc<ComponentClass> {
        COLLECTION_CLASS
            .get_or_init(|| {
                ComponentClass::base().extend(
                    "CollectionComponent",
                    to_options(json!({ "defaultParams": {} })),
                )
            })
            .clone()
    }

    /// Collection component of `class` fetching through `source`
    ///
    /// Must run inside a `tokio::task::LocalSet` as soon as it may be shown
    /// before its first load, including when it is attached with
    /// `visible = true`: the deferred load is spawned with `spawn_local`.
    pub fn new(class: Arc<ComponentClass>, options: Options, source: impl CollectionSource + 'static) -> Self {
        Self::from_builder(Component::builder(class).options(options), Rc::new(source))
    }

    /// Finish a component builder as a collection component.
    ///
    /// The collection is constructed here, once, from `source`. The same
    /// `LocalSet` requirement as [`CollectionComponent::new`] applies.
    pub fn from_builder(builder: ComponentBuilder, source: Rc<dyn CollectionSource>) -> Self {
        let component = builder.build();
        if !component.class().is_a("CollectionComponent") {
            tracing::warn!(
                component = %component.name(),
                class = component.class().tag(),
                "class does not extend CollectionComponent; defaultParams will be ignored"
            );
        }

        let default_params = component
            .option(keys::DEFAULT_PARAMS)
            .map(to_options)
            .unwrap_or_default();

        let state = Rc::new(LoadState {
            collection: Collection::new(source),
            params: RefCell::new(default_params.clone()),
            default_params,
            loaded: Cell::new(false),
            generation: Cell::new(0),
            in_flight: Cell::new(0),
            pending_show: RefCell::new(None),
            tasks: RefCell::new(Vec::new()),
        });

        let weak = component.downgrade();
        component
            .emitter()
            .listen_to(state.collection.emitter(), RESET, move |_| {
                if let Some(component) = weak.upgrade() {
                    component.render();
                }
            });
        component.set_show_gate(state.clone());

        Self { component, state }
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn into_component(self) -> Component {
        self.component
    }

    pub fn collection(&self) -> &Collection {
        &self.state.collection
    }

    pub fn default_params(&self) -> &Options {
        &self.state.default_params
    }

    /// Params of the most recently issued load
    pub fn params(&self) -> Options {
        self.state.params.borrow().clone()
    }

    /// True once a load has been applied; never reverts
    pub fn is_loaded(&self) -> bool {
        self.state.loaded.get()
    }

    pub fn name(&self) -> String {
        self.component.name()
    }

    pub fn is_visible(&self) -> bool {
        self.component.is_visible()
    }

    /// Gated show (see the module docs)
    pub fn show(&self, options: ShowOptions) -> &Self {
        self.component.show(options);
        self
    }

    /// Fetch with `merge(default_params, params)` and apply the result.
    ///
    /// Resolves once the fetch completed; an `Applied` outcome means the
    /// collection was reset and `collectionLoaded` emitted.
    pub async fn load(&self, params: Option<Options>) -> Result<LoadOutcome, LoadError> {
        self.state.load(&self.component, params).await
    }

    /// Load again with the params of the last load
    pub async fn refresh(&self) -> Result<LoadOutcome, LoadError> {
        let params = self.params();
        self.load(Some(params)).await
    }

    /// Wait for every load scheduled by deferred shows to finish
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.state.tasks.borrow_mut());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(component = %self.component.name(), error = %e, "collection load task failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for CollectionComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionComponent")
            .field("component", &self.component)
            .field("collection", &self.state.collection)
            .field("loaded", &self.state.loaded.get())
            .finish()
    }
}
