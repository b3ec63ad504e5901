// Trellis - hierarchical UI component lifecycle
//
// A tree of components, each with visibility and setup state, named children,
// event bubbling and optional "singly" coordination (one visible child at a
// time). Collection components gate their visibility on an async fetch.
//
// Architecture:
// - events: Emitter pub/sub with listen_to bookkeeping
// - options: class chains of default option mappings
// - component: the lifecycle state machine and tree operations
// - collection: sources, collections and the load-gated component
// - layout: declarative trees and scripted steps loaded from TOML
// - config / logging: ambient configuration and tracing setup

pub mod collection;
pub mod component;
pub mod config;
pub mod demo;
pub mod events;
pub mod layout;
pub mod logging;
pub mod options;

pub use collection::{CollectionComponent, CollectionSource, HttpSource, LoadError, LoadOutcome, MemorySource};
pub use component::{Component, HideOptions, ShowOptions, TracingView, View};
pub use events::{Emitter, EventData, ListenerId};
pub use options::{ComponentClass, Options};
