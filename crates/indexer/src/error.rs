use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] semindex_code_chunker::ChunkerError),

    #[error("Embedder error: {0}")]
    EmbedderError(#[from] semindex_embedder::EmbedderError),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] semindex_vector_store::VectorStoreError),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid workspace path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Whether this error should put the indexer into the `Error` state
    /// (as opposed to the per-file skips the pipeline absorbs inline).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ChunkerError(_) => false,
            Self::EmbedderError(e) => !e.is_transient(),
            Self::VectorStoreError(e) => !e.is_transient(),
            Self::IoError(_) | Self::ConfigInvalid(_) | Self::InvalidPath(_) | Self::Other(_) => {
                true
            }
        }
    }
}
