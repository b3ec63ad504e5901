//! Remote-backed collections and the component that waits for them
//!
//! # Architecture
//!
//! ```text
//! CollectionSource ──fetch(params)──▶ Vec<Value> ──▶ Collection::reset ──▶ "reset"
//!        ▲                                                                   │
//!        │ load / refresh                                                    ▼
//! CollectionComponent (show gate) ◀──────────────────────────────── component.render()
//! ```
//!
//! A [`CollectionSource`] is the transport: it turns a parameter mapping into
//! a list of models. A [`Collection`] owns the current models and announces
//! replacements with a `reset` event. [`CollectionComponent`] ties the two to a
//! component's lifecycle: it refuses to become visible before the first load
//! has been applied.

mod component;
mod http;
mod memory;

pub use component::{CollectionComponent, LoadOutcome};
pub use http::HttpSource;
pub use memory::MemorySource;

use crate::events::{Emitter, EventData, RESET};
use crate::options::Options;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The request never produced a response
    Network(String),
    /// The server answered with a non-success status
    Status { status: u16, url: String },
    /// The response body was not a list of models
    Decode(String),
    /// A source-specific failure
    Source(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Status { status, url } => write!(f, "HTTP {} from {}", status, url),
            Self::Decode(msg) => write!(f, "Unexpected response body: {}", msg),
            Self::Source(msg) => write!(f, "Source error: {}", msg),
        }
    }
}

impl std::error::Error for LoadError {}

// ─────────────────────────────────────────────────────────────────────────────
// Source & collection
// ─────────────────────────────────────────────────────────────────────────────

/// Transport a collection fetches its models through
pub trait CollectionSource {
    /// Short human-readable description for logs
    fn describe(&self) -> String;

    /// Fetch the models matching `params`.
    ///
    /// The future must not borrow `self`; clone whatever it needs.
    fn fetch(&self, params: &Options) -> LocalBoxFuture<'static, Result<Vec<Value>, LoadError>>;
}

/// List-like holder of the models a source returned
pub struct Collection {
    source: Rc<dyn CollectionSource>,
    models: RefCell<Vec<Value>>,
    emitter: Emitter,
}

impl Collection {
    pub fn new(source: Rc<dyn CollectionSource>) -> Self {
        Self {
            source,
            models: RefCell::new(Vec::new()),
            emitter: Emitter::new(),
        }
    }

    pub fn source(&self) -> &Rc<dyn CollectionSource> {
        &self.source
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn fetch(&self, params: &Options) -> LocalBoxFuture<'static, Result<Vec<Value>, LoadError>> {
        self.source.fetch(params)
    }

    /// Replace the contents and announce it with `reset`
    pub fn reset(&self, models: Vec<Value>) {
        *self.models.borrow_mut() = models;
        self.emitter.trigger(RESET, &EventData::Empty);
    }

    pub fn models(&self) -> Vec<Value> {
        self.models.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.models.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.borrow().is_empty()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("source", &self.source.describe())
            .field("len", &self.len())
            .finish()
    }
}
