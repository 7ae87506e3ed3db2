//! # Embedder
//!
//! Pluggable remote embedding clients for the indexing pipeline.
//!
//! Three wire dialects behind one [`Embedder`] capability:
//! OpenAI (`POST {base}/v1/embeddings`, bearer auth), Ollama
//! (`POST {base}/api/embeddings`, one request per input), and any
//! OpenAI-compatible endpoint (`POST {base}/embeddings`, explicit
//! dimension). Requests batch up to 64 inputs and retry 429/5xx with
//! exponential backoff.

mod client;
mod error;
mod models;
mod provider;
mod retry;

pub use client::{Embedder, EmbeddingBatch, HttpEmbedder, DEFAULT_EMBED_BATCH_SIZE};
pub use error::{EmbedderError, Result};
pub use models::model_dimension;
pub use provider::EmbedderProvider;
pub use retry::{status_is_transient, RetryPolicy};
