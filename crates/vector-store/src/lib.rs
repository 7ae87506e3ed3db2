//! # Vector Store
//!
//! Remote vector database client for the indexing pipeline, targeting the
//! Qdrant REST API: collection create/delete/info, point upsert, filtered
//! delete, and semantic search with a score floor.
//!
//! Each workspace maps to one collection (`ws-<hash>`); all points in a
//! collection share the embedding dimension, and a dimension change on
//! the configured model recreates the collection from scratch.

mod client;
mod error;
mod types;

pub use client::{QdrantClient, VectorStore, UPSERT_BATCH_SIZE};
pub use error::{Result, VectorStoreError};
pub use types::{collection_name_for_workspace, PointPayload, SearchMatch, VectorPoint};
