//! Search backend client.
//!
//! The pipeline talks to the backend through the [`SearchBackend`] trait so
//! tests can substitute an in-memory double; [`EsBackend`] is the production
//! implementation over the Elasticsearch HTTP API.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::IndexError;
use gitterlog_archive::IndexedDocument;

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Create the backing index if it does not exist yet.
    async fn ensure_index(&self) -> Result<(), IndexError>;

    /// Submit one batch of documents and return how many the backend
    /// acknowledged.
    async fn submit(&self, docs: &[IndexedDocument]) -> Result<usize, IndexError>;
}

pub struct EsBackend {
    http: reqwest::Client,
    base_url: String,
    index: String,
}

impl EsBackend {
    pub fn new(base_url: &str, index: &str) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder().user_agent("gitterlog").build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    fn mapping() -> Value {
        json!({
            "settings": { "number_of_shards": 1 },
            "mappings": {
                "properties": {
                    "group_name": { "type": "keyword" },
                    "room_name": { "type": "keyword" },
                    "display_name": { "type": "text" },
                    "username": { "type": "keyword" },
                    "message": { "type": "text" },
                    "sent": { "type": "date", "format": "date_optional_time" },
                    "permalink": { "type": "text" }
                }
            }
        })
    }
}

#[async_trait]
impl SearchBackend for EsBackend {
    async fn ensure_index(&self) -> Result<(), IndexError> {
        let url = format!("{}/_aliases", self.base_url);
        let catalog: Value = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let exists = catalog
            .as_object()
            .map(|indexes| indexes.contains_key(&self.index))
            .unwrap_or(false);
        if exists {
            return Ok(());
        }

        info!(index = %self.index, "creating search index");
        let url = format!("{}/{}", self.base_url, self.index);
        self.http
            .put(&url)
            .json(&Self::mapping())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn submit(&self, docs: &[IndexedDocument]) -> Result<usize, IndexError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let body = bulk_body(&self.index, docs)
            .map_err(|e| IndexError::MalformedResponse(e.to_string()))?;
        let url = format!("{}/_bulk", self.base_url);
        let response: Value = self
            .http
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let acked = count_acks(&response)?;
        debug!(submitted = docs.len(), acked, "bulk submission complete");
        Ok(acked)
    }
}

/// NDJSON body for a bulk request: an action line per document followed by
/// its source line.
fn bulk_body(index: &str, docs: &[IndexedDocument]) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    let action = serde_json::to_string(&json!({ "index": { "_index": index } }))?;
    for doc in docs {
        body.push_str(&action);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

/// Count per-document acknowledgements in a bulk response.
fn count_acks(response: &Value) -> Result<usize, IndexError> {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            IndexError::MalformedResponse("bulk response missing items array".to_string())
        })?;
    let acked = items
        .iter()
        .filter(|item| {
            item.get("index")
                .and_then(|op| op.get("status"))
                .and_then(Value::as_u64)
                .is_some_and(|status| (200..300).contains(&status))
        })
        .count();
    Ok(acked)
}
