use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// Retryable: 429, 5xx, transport failures, timeouts.
    #[error("Transient vector store error: {0}")]
    Transient(String),

    /// Not retryable: other 4xx, malformed responses, retries exhausted.
    #[error("Vector store error: {0}")]
    Permanent(String),
}

impl VectorStoreError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for VectorStoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Self::Transient(e.to_string())
        } else {
            Self::Permanent(e.to_string())
        }
    }
}
