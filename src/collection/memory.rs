//! In-process collection source

use super::{CollectionSource, LoadError};
use crate::options::Options;
use futures::future::{self, FutureExt, LocalBoxFuture};
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;

type Fetcher = dyn Fn(&Options) -> Result<Vec<Value>, LoadError>;

/// Source answering fetches from a closure, synchronously
///
/// Clones share the closure and the fetch counter, so a clone kept aside can
/// observe how often the collection fetched.
#[derive(Clone)]
pub struct MemorySource {
    label: String,
    fetcher: Rc<Fetcher>,
    fetches: Rc<Cell<usize>>,
}

impl MemorySource {
    pub fn new(
        label: impl Into<String>,
        fetcher: impl Fn(&Options) -> Result<Vec<Value>, LoadError> + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            fetcher: Rc::new(fetcher),
            fetches: Rc::new(Cell::new(0)),
        }
    }

    /// Always returns `models`, whatever the params
    pub fn fixed(models: Vec<Value>) -> Self {
        Self::new("fixed", move |_| Ok(models.clone()))
    }

    /// Returns `models` ordered by the field named in the `sort` param and
    /// truncated to the `limit` param, when present
    pub fn sorted(models: Vec<Value>) -> Self {
        Self::new("sorted", move |params| {
            let mut models = models.clone();
            if let Some(field) = params.get("sort").and_then(Value::as_str) {
                models.sort_by(|a, b| compare(&a[field], &b[field]));
            }
            if let Some(limit) = params.get("limit").and_then(Value::as_u64) {
                models.truncate(limit as usize);
            }
            Ok(models)
        })
    }

    /// Number of fetches issued so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

impl CollectionSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory:{}", self.label)
    }

    fn fetch(&self, params: &Options) -> LocalBoxFuture<'static, Result<Vec<Value>, LoadError>> {
        self.fetches.set(self.fetches.get() + 1);
        future::ready((self.fetcher)(params)).boxed_local()
    }
}
