use crate::error::{EmbedderError, Result};
use crate::models::model_dimension;
use crate::provider::EmbedderProvider;
use crate::retry::{status_is_transient, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// One embed call's result: vectors aligned to the input texts.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub model: String,
    pub dim: usize,
}

/// The capability the indexing pipeline depends on. Production uses
/// [`HttpEmbedder`]; tests substitute in-memory fakes.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch>;
    fn dimension(&self) -> usize;
    fn model_id(&self) -> &str;
}

/// Remote embedder over HTTP, one of three wire dialects.
pub struct HttpEmbedder {
    provider: EmbedderProvider,
    base_url: String,
    api_key: Option<String>,
    model_id: String,
    dimension: usize,
    batch_size: usize,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl HttpEmbedder {
    /// OpenAI: bearer auth, dimension resolved from the static model table.
    pub fn openai(
        base_url: Option<&str>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Result<Self> {
        let model_id = model_id.into();
        let dimension = model_dimension(EmbedderProvider::OpenAi, &model_id).ok_or_else(|| {
            EmbedderError::UnknownModel {
                provider: "openai".to_string(),
                model: model_id.clone(),
            }
        })?;
        Ok(Self::build(
            EmbedderProvider::OpenAi,
            base_url.unwrap_or(OPENAI_DEFAULT_BASE_URL),
            Some(api_key.into()),
            model_id,
            dimension,
        ))
    }

    /// Ollama: no auth, one request per input, table-resolved dimension.
    pub fn ollama(base_url: Option<&str>, model_id: impl Into<String>) -> Result<Self> {
        let model_id = model_id.into();
        let dimension = model_dimension(EmbedderProvider::Ollama, &model_id).ok_or_else(|| {
            EmbedderError::UnknownModel {
                provider: "ollama".to_string(),
                model: model_id.clone(),
            }
        })?;
        Ok(Self::build(
            EmbedderProvider::Ollama,
            base_url.unwrap_or(OLLAMA_DEFAULT_BASE_URL),
            None,
            model_id,
            dimension,
        ))
    }

    /// Any OpenAI-compatible endpoint; the dimension must be configured
    /// explicitly because there is no model table to consult.
    pub fn openai_compatible(
        base_url: &str,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self::build(
            EmbedderProvider::OpenAiCompatible,
            base_url,
            Some(api_key.into()),
            model_id.into(),
            dimension,
        )
    }

    fn build(
        provider: EmbedderProvider,
        base_url: &str,
        api_key: Option<String>,
        model_id: String,
        dimension: usize,
    ) -> Self {
        Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model_id,
            dimension,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            retry: RetryPolicy::default(),
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }

    #[must_use]
    pub const fn provider(&self) -> EmbedderProvider {
        self.provider
    }

    fn embeddings_url(&self) -> String {
        match self.provider {
            EmbedderProvider::OpenAi => format!("{}/v1/embeddings", self.base_url),
            EmbedderProvider::Ollama => format!("{}/api/embeddings", self.base_url),
            EmbedderProvider::OpenAiCompatible => format!("{}/embeddings", self.base_url),
        }
    }

    async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<serde_json::Value> {
        let mut attempt = 0u32;
        loop {
            let delay = self.retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut request = self.http.post(url).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let err = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if (200..300).contains(&status) {
                        return response
                            .json::<serde_json::Value>()
                            .await
                            .map_err(|e| EmbedderError::Permanent(e.to_string()));
                    }
                    let body = response.text().await.unwrap_or_default();
                    if status_is_transient(status) {
                        EmbedderError::Transient(format!("HTTP {status}: {body}"))
                    } else {
                        return Err(EmbedderError::Permanent(format!("HTTP {status}: {body}")));
                    }
                }
                Err(e) => {
                    let err = EmbedderError::from(e);
                    if !err.is_transient() {
                        return Err(err);
                    }
                    err
                }
            };

            if self.retry.attempts_exhausted(attempt) {
                return Err(EmbedderError::Permanent(format!(
                    "retries exhausted after {} attempts: {err}",
                    self.retry.max_attempts
                )));
            }
            log::warn!("Embed request retrying (attempt {}): {err}", attempt + 1);
            attempt += 1;
        }
    }

    async fn embed_openai_dialect(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct RequestBody<'a> {
            model: &'a str,
            input: &'a [String],
        }

        #[derive(Deserialize)]
        struct ResponseBody {
            data: Vec<EmbeddingItem>,
        }

        #[derive(Deserialize)]
        struct EmbeddingItem {
            embedding: Vec<f32>,
            index: usize,
        }

        let value = self
            .post_json(
                &self.embeddings_url(),
                &RequestBody {
                    model: &self.model_id,
                    input: texts,
                },
            )
            .await?;

        let mut parsed: ResponseBody = serde_json::from_value(value)
            .map_err(|e| EmbedderError::Permanent(format!("malformed embeddings response: {e}")))?;
        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }

    async fn embed_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct RequestBody<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct ResponseBody {
            embedding: Vec<f32>,
        }

        let url = self.embeddings_url();
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let value = self
                .post_json(
                    &url,
                    &RequestBody {
                        model: &self.model_id,
                        prompt: text,
                    },
                )
                .await?;
            let parsed: ResponseBody = serde_json::from_value(value).map_err(|e| {
                EmbedderError::Permanent(format!("malformed ollama response: {e}"))
            })?;
            vectors.push(parsed.embedding);
        }
        Ok(vectors)
    }

    fn validate(&self, texts: &[String], vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != texts.len() {
            return Err(EmbedderError::Permanent(format!(
                "embedder returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(EmbedderError::Permanent(format!(
                "embedder returned dimension {} (expected {})",
                bad.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            let batch_vectors = match self.provider {
                EmbedderProvider::OpenAi | EmbedderProvider::OpenAiCompatible => {
                    self.embed_openai_dialect(batch).await?
                }
                EmbedderProvider::Ollama => self.embed_ollama(batch).await?,
            };
            vectors.extend(batch_vectors);
        }
        self.validate(texts, &vectors)?;
        Ok(EmbeddingBatch {
            vectors,
            model: self.model_id.clone(),
            dim: self.dimension,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
