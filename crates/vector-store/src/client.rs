use crate::error::{Result, VectorStoreError};
use crate::types::{PointPayload, SearchMatch, VectorPoint};
use async_trait::async_trait;
use semindex_embedder::{status_is_transient, RetryPolicy};
use serde_json::{json, Value};
use std::time::Duration;

pub const UPSERT_BATCH_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Store operations the pipeline depends on. Production talks to Qdrant
/// over REST; tests substitute an in-memory fake.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if missing. An existing collection with a
    /// different vector dimension is deleted and recreated; returns true
    /// when that happened so callers can trigger a full reindex.
    async fn ensure_collection(&self, dim: usize) -> Result<bool>;

    /// Idempotent by point id. Splits into batches of at most 100.
    async fn upsert_points(&self, points: Vec<VectorPoint>) -> Result<()>;

    /// Remove every point whose `payload.filePath` equals `rel_path`.
    async fn delete_by_file_path(&self, rel_path: &str) -> Result<()>;

    /// Points scoring at least `min_score`, best first.
    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchMatch>>;

    async fn drop_collection(&self) -> Result<()>;
}

/// Qdrant REST client scoped to one collection.
pub struct QdrantClient {
    base_url: String,
    collection: String,
    api_key: Option<String>,
    retry: RetryPolicy,
    http: reqwest::Client,
}

#[derive(Clone, Copy)]
enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl QdrantClient {
    pub fn new(base_url: &str, collection: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key,
            retry: RetryPolicy::default(),
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Issue one request, retrying transient failures. Returns the final
    /// status and parsed body; non-2xx statuses other than retryable ones
    /// are returned to the caller to interpret.
    async fn request(&self, method: Method, url: &str, body: Option<Value>) -> Result<(u16, Value)> {
        let mut attempt = 0u32;
        loop {
            let delay = self.retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut request = match method {
                Method::Get => self.http.get(url),
                Method::Put => self.http.put(url),
                Method::Post => self.http.post(url),
                Method::Delete => self.http.delete(url),
            };
            if let Some(key) = &self.api_key {
                request = request.header("api-key", key);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let err = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !status_is_transient(status) {
                        let value = response.json::<Value>().await.unwrap_or(Value::Null);
                        return Ok((status, value));
                    }
                    let body = response.text().await.unwrap_or_default();
                    VectorStoreError::Transient(format!("HTTP {status}: {body}"))
                }
                Err(e) => {
                    let err = VectorStoreError::from(e);
                    if !err.is_transient() {
                        return Err(err);
                    }
                    err
                }
            };

            if self.retry.attempts_exhausted(attempt) {
                return Err(VectorStoreError::Permanent(format!(
                    "retries exhausted after {} attempts: {err}",
                    self.retry.max_attempts
                )));
            }
            log::warn!("Vector store retrying (attempt {}): {err}", attempt + 1);
            attempt += 1;
        }
    }

    async fn expect_2xx(&self, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
        let (status, value) = self.request(method, url, body).await?;
        if (200..300).contains(&status) {
            Ok(value)
        } else {
            Err(VectorStoreError::Permanent(format!(
                "HTTP {status} from {url}: {value}"
            )))
        }
    }

    async fn existing_dimension(&self) -> Result<Option<usize>> {
        let (status, value) = self.request(Method::Get, &self.collection_url(), None).await?;
        match status {
            404 => Ok(None),
            status if (200..300).contains(&status) => {
                let size = value
                    .pointer("/result/config/params/vectors/size")
                    .and_then(Value::as_u64);
                match size {
                    Some(size) => Ok(Some(size as usize)),
                    None => Err(VectorStoreError::Permanent(format!(
                        "collection info missing vector size: {value}"
                    ))),
                }
            }
            status => Err(VectorStoreError::Permanent(format!(
                "HTTP {status} reading collection info: {value}"
            ))),
        }
    }

    async fn create_collection(&self, dim: usize) -> Result<()> {
        self.expect_2xx(
            Method::Put,
            &self.collection_url(),
            Some(json!({
                "vectors": { "size": dim, "distance": "Cosine" }
            })),
        )
        .await?;

        // Keyword index on filePath keeps delete-by-filter cheap. Index
        // creation failing is not fatal for correctness.
        let index_url = format!("{}/index", self.collection_url());
        let index_body = json!({ "field_name": "filePath", "field_schema": "keyword" });
        if let Err(e) = self.expect_2xx(Method::Put, &index_url, Some(index_body)).await {
            log::warn!("Failed to create filePath payload index: {e}");
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantClient {
    async fn ensure_collection(&self, dim: usize) -> Result<bool> {
        match self.existing_dimension().await? {
            None => {
                log::info!("Creating collection {} (dim {dim})", self.collection);
                self.create_collection(dim).await?;
                Ok(false)
            }
            Some(existing) if existing == dim => Ok(false),
            Some(existing) => {
                log::info!(
                    "Collection {} has dimension {existing}, expected {dim}; recreating",
                    self.collection
                );
                self.drop_collection().await?;
                self.create_collection(dim).await?;
                Ok(true)
            }
        }
    }

    async fn upsert_points(&self, points: Vec<VectorPoint>) -> Result<()> {
        let url = format!("{}/points?wait=true", self.collection_url());
        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            let body = json!({
                "points": batch
                    .iter()
                    .map(|p| json!({
                        "id": p.id,
                        "vector": p.vector,
                        "payload": p.payload,
                    }))
                    .collect::<Vec<_>>()
            });
            self.expect_2xx(Method::Put, &url, Some(body)).await?;
        }
        Ok(())
    }

    async fn delete_by_file_path(&self, rel_path: &str) -> Result<()> {
        let url = format!("{}/points/delete?wait=true", self.collection_url());
        let body = json!({
            "filter": {
                "must": [{ "key": "filePath", "match": { "value": rel_path } }]
            }
        });
        self.expect_2xx(Method::Post, &url, Some(body)).await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchMatch>> {
        let url = format!("{}/points/search", self.collection_url());
        let body = json!({
            "vector": vector,
            "limit": limit,
            "score_threshold": min_score,
            "with_payload": true,
        });
        let value = self.expect_2xx(Method::Post, &url, Some(body)).await?;

        let hits = value
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut matches = Vec::with_capacity(hits.len());
        for hit in hits {
            let score = hit
                .get("score")
                .and_then(Value::as_f64)
                .unwrap_or_default() as f32;
            let payload: PointPayload = serde_json::from_value(
                hit.get("payload").cloned().unwrap_or(Value::Null),
            )
            .map_err(|e| {
                VectorStoreError::Permanent(format!("malformed search payload: {e}"))
            })?;
            matches.push(SearchMatch { score, payload });
        }
        Ok(matches)
    }

    async fn drop_collection(&self) -> Result<()> {
        self.expect_2xx(Method::Delete, &self.collection_url(), None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn urls_are_scoped_to_the_collection() {
        let client = QdrantClient::new("http://localhost:6333/", "ws-abc", None);
        assert_eq!(
            client.collection_url(),
            "http://localhost:6333/collections/ws-abc"
        );
    }

    #[test]
    fn upsert_batches_never_exceed_the_cap() {
        let points: Vec<usize> = (0..257).collect();
        let batches: Vec<usize> = points.chunks(UPSERT_BATCH_SIZE).map(<[usize]>::len).collect();
        assert_eq!(batches, vec![100, 100, 57]);
    }
}
