//! Collection source backed by a JSON HTTP endpoint
//!
//! Fetch parameters are sent as the query string of a GET request. The body
//! must be either a JSON array of models or an object carrying the array under
//! `"items"`.

use super::{CollectionSource, LoadError};
use crate::config::HttpConfig;
use crate::options::Options;
use anyhow::{Context, Result};
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;

/// Key holding the models when the endpoint wraps them in an object
const ITEMS_KEY: &str = "items";

/// Source fetching models over HTTP with reqwest
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    /// Build a source with its own client configured from `config`
    pub fn new(url: impl Into<String>, config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_client(client, url))
    }

    /// Build a source sharing an existing client
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Flatten params into query pairs. Strings go as-is, nulls are skipped,
/// everything else is sent as its JSON text.
fn query_pairs(params: &Options) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key.clone(), s.clone())),
            other => Some((key.clone(), other.to_string())),
        })
        .collect()
}

fn models_from_body(body: Value) -> Result<Vec<Value>, LoadError> {
    match body {
        Value::Array(models) => Ok(models),
        Value::Object(mut map) => match map.remove(ITEMS_KEY) {
            Some(Value::Array(models)) => Ok(models),
            _ => Err(LoadError::Decode(format!(
                "expected an array or an object with an '{}' array",
                ITEMS_KEY
            ))),
        },
        other => Err(LoadError::Decode(format!(
            "expected an array, got {}",
            other
        ))),
    }
}

impl CollectionSource for HttpSource {
    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }

    fn fetch(&self, params: &Options) -> LocalBoxFuture<'static, Result<Vec<Value>, LoadError>> {
        let client = self.client.clone();
        let url = self.url.clone();
        let query = query_pairs(params);

        async move {
            tracing::debug!(url = %url, ?query, "fetching collection");

            let response = client
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(|e| LoadError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::Status {
                    status: status.as_u16(),
                    url,
                });
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| LoadError::Decode(e.to_string()))?;
            models_from_body(body)
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::to_options;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    /// Serve a tiny API on an ephemeral port and return its base URL
    async fn spawn_server() -> String {
        async fn items(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
            let mut names = vec!["carol", "alice", "bob"];
            if query.get("sort").map(String::as_str) == Some("name") {
                names.sort();
            }
            Json(json!(names
                .into_iter()
                .map(|name| json!({ "name": name, "page": query.get("page") }))
                .collect::<Vec<_>>()))
        }

        async fn wrapped() -> Json<Value> {
            Json(json!({ "items": [{ "id": 1 }], "total": 1 }))
        }

        async fn broken() -> StatusCode {
            StatusCode::SERVICE_UNAVAILABLE
        }

        async fn scalar() -> Json<Value> {
            Json(json!(42))
        }

        let app = Router::new()
            .route("/items", get(items))
            .route("/wrapped", get(wrapped))
            .route("/broken", get(broken))
            .route("/scalar", get(scalar));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn source(base: &str, path: &str) -> HttpSource {
        HttpSource::new(format!("{}{}", base, path), &HttpConfig::default()).unwrap()
    }

    #[test]
    fn test_query_pairs_flatten_values() {
        let pairs = query_pairs(&to_options(json!({
            "sort": "date",
            "page": 2,
            "archived": false,
            "cursor": null,
        })));

        let map: HashMap<String, String> = pairs.into_iter().collect();
        assert_eq!(map["sort"], "date");
        assert_eq!(map["page"], "2");
        assert_eq!(map["archived"], "false");
        assert!(!map.contains_key("cursor"));
    }

    #[tokio::test]
    async fn test_fetch_sends_params_as_query() {
        let base = spawn_server().await;
        let models = source(&base, "/items")
            .fetch(&to_options(json!({ "sort": "name", "page": 3 })))
            .await
            .unwrap();

        let names: Vec<&str> = models.iter().filter_map(|m| m["name"].as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert_eq!(models[0]["page"], json!("3"));
    }

    #[tokio::test]
    async fn test_fetch_unwraps_items_object() {
        let base = spawn_server().await;
        let models = source(&base, "/wrapped").fetch(&Options::new()).await.unwrap();
        assert_eq!(models, vec![json!({ "id": 1 })]);
    }

    #[tokio::test]
    async fn test_fetch_reports_status_errors() {
        let base = spawn_server().await;
        let err = source(&base, "/broken")
            .fetch(&Options::new())
            .await
            .unwrap_err();

        match err {
            LoadError::Status { status, url } => {
                assert_eq!(status, 503);
                assert!(url.ends_with("/broken"));
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_list_bodies() {
        let base = spawn_server().await;
        let err = source(&base, "/scalar")
            .fetch(&Options::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)));
    }
}
