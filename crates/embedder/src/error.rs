use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedderError>;

#[derive(Error, Debug)]
pub enum EmbedderError {
    /// Retryable: 429, 5xx, transport failures, timeouts.
    #[error("Transient embedder error: {0}")]
    Transient(String),

    /// Not retryable: auth failures, malformed responses, 4xx other
    /// than 429, retries exhausted.
    #[error("Embedder error: {0}")]
    Permanent(String),

    #[error("Unknown embedding model: {provider}/{model}")]
    UnknownModel { provider: String, model: String },
}

impl EmbedderError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for EmbedderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Self::Transient(e.to_string())
        } else {
            Self::Permanent(e.to_string())
        }
    }
}
