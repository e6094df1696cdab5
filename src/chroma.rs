//! HTTP client for a Chroma-style vector store.
//!
//! The collection id is resolved lazily: nothing talks to the store at
//! construction time, and the first operation that needs the id performs
//! a lookup-by-name followed by a get-or-create. Resolution is
//! single-flight behind an async mutex so concurrent first calls do not
//! race to create the collection. [`ChromaClient::ensure_collection`]
//! never returns an error; failures are logged and retried on the next
//! operation.

use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::ChromaConfig;
use crate::error::VectorStoreError;
use crate::models::DocumentMatch;

pub struct ChromaClient {
    config: ChromaConfig,
    http: reqwest::Client,
    collection_id: Mutex<Option<String>>,
}

impl ChromaClient {
    pub fn new(config: ChromaConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            config,
            http,
            collection_id: Mutex::new(None),
        }
    }

    fn api(&self, path: &str) -> String {
        format!(
            "{}/api/v1{}",
            self.config.url.trim_end_matches('/'),
            path
        )
    }

    /// Best-effort warm-up of the collection id. Never fails: a store
    /// that is down at startup is retried on first use.
    pub async fn ensure_collection(&self) {
        if let Err(e) = self.collection_id().await {
            eprintln!(
                "chroma: collection '{}' not ready yet: {}",
                self.config.collection, e
            );
        }
    }

    /// Resolve the collection id, creating the collection if needed.
    /// Single-flight: the mutex is held across the whole resolution.
    async fn collection_id(&self) -> Result<String, VectorStoreError> {
        let mut guard = self.collection_id.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }

        let id = match self.lookup_collection().await? {
            Some(id) => id,
            None => self.get_or_create_collection().await?,
        };

        println!(
            "chroma: collection '{}' resolved to id {}",
            self.config.collection, id
        );
        *guard = Some(id.clone());
        Ok(id)
    }

    /// GET the collection by name. `Ok(None)` when the store answers but
    /// the collection does not exist.
    async fn lookup_collection(&self) -> Result<Option<String>, VectorStoreError> {
        let url = format!("{}?name={}", self.api("/collections"), self.config.collection);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();

        if status.as_u16() == 404 {
            return Ok(None);
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(VectorStoreError::Status {
                op: "lookup collection",
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| VectorStoreError::Malformed(format!("lookup response: {}", e)))?;
        Ok(extract_collection_id(&json))
    }

    async fn get_or_create_collection(&self) -> Result<String, VectorStoreError> {
        let url = self.api("/collections");
        let body = creation_body(&self.config.collection, self.config.dims);

        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(VectorStoreError::Status {
                op: "create collection",
                status: status.as_u16(),
                body: text,
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| VectorStoreError::Malformed(format!("create response: {}", e)))?;
        extract_collection_id(&json).ok_or_else(|| {
            VectorStoreError::Unresolved(format!(
                "no collection id in create response for '{}'",
                self.config.collection
            ))
        })
    }

    /// Upsert one vector with its document text and metadata.
    pub async fn upsert(
        &self,
        vector_id: &str,
        embedding: &[f32],
        document: &str,
        metadata: Value,
    ) -> Result<(), VectorStoreError> {
        let collection_id = self.collection_id().await?;
        let url = self.api(&format!("/collections/{}/upsert", collection_id));

        // Parallel arrays, one element each.
        let body = json!({
            "ids": [vector_id],
            "embeddings": [embedding],
            "documents": [document],
            "metadatas": [metadata],
        });

        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(VectorStoreError::Status {
                op: "upsert",
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(())
    }

    /// Nearest-neighbour query. Returns matches ordered by ascending
    /// distance, as the store produced them.
    pub async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<DocumentMatch>, VectorStoreError> {
        let collection_id = self.collection_id().await?;
        let url = self.api(&format!("/collections/{}/query", collection_id));

        // query_embeddings is a one-element outer list: one query.
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["metadatas", "documents", "distances"],
        });

        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(VectorStoreError::Status {
                op: "query",
                status: status.as_u16(),
                body: text,
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| VectorStoreError::Malformed(format!("query response: {}", e)))?;
        parse_query_response(&json)
    }
}

/// Body for collection creation. The distance space and vector
/// dimensionality are pinned at creation time; the store rejects
/// mismatched vectors later otherwise.
fn creation_body(name: &str, dims: usize) -> Value {
    json!({
        "name": name,
        "get_or_create": true,
        "metadata": {
            "hnsw:space": "cosine",
            "dimensionality": dims,
        },
    })
}

/// Pull the collection id out of any of the response shapes Chroma
/// deployments have produced: a top-level `id`, a nested
/// `collection.id`, or the first element of a `collections` array.
fn extract_collection_id(json: &Value) -> Option<String> {
    if let Some(id) = json.get("id").and_then(Value::as_str) {
        return Some(id.to_string());
    }
    if let Some(id) = json
        .pointer("/collection/id")
        .and_then(Value::as_str)
    {
        return Some(id.to_string());
    }
    if let Some(id) = json
        .pointer("/collections/0/id")
        .and_then(Value::as_str)
    {
        return Some(id.to_string());
    }
    None
}

/// Flatten the parallel result arrays for the single query. Rows with a
/// missing document or distance are skipped rather than failing the
/// whole query.
fn parse_query_response(json: &Value) -> Result<Vec<DocumentMatch>, VectorStoreError> {
    let documents = json
        .pointer("/documents/0")
        .and_then(Value::as_array)
        .ok_or_else(|| VectorStoreError::Malformed("query response missing documents".into()))?;
    let distances = json
        .pointer("/distances/0")
        .and_then(Value::as_array)
        .ok_or_else(|| VectorStoreError::Malformed("query response missing distances".into()))?;
    let empty = Vec::new();
    let metadatas = json
        .pointer("/metadatas/0")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let mut out = Vec::with_capacity(documents.len());
    for (i, doc) in documents.iter().enumerate() {
        let Some(text) = doc.as_str() else {
            continue;
        };
        let Some(distance) = distances.get(i).and_then(Value::as_f64) else {
            continue;
        };
        let metadata = metadatas.get(i).cloned().unwrap_or(Value::Null);
        out.push(DocumentMatch {
            text: text.to_string(),
            metadata,
            distance,
        });
    }
    Ok(out)
}
