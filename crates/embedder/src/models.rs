use crate::provider::EmbedderProvider;

/// Static `(provider, model) -> dimension` table. OpenAI-compatible
/// endpoints have no table; their dimension comes from configuration.
pub fn model_dimension(provider: EmbedderProvider, model_id: &str) -> Option<usize> {
    match provider {
        EmbedderProvider::OpenAi => match model_id {
            "text-embedding-3-small" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            "text-embedding-ada-002" => Some(1536),
            _ => None,
        },
        EmbedderProvider::Ollama => match model_id {
            "nomic-embed-text" => Some(768),
            "mxbai-embed-large" => Some(1024),
            "all-minilm" => Some(384),
            "snowflake-arctic-embed2" => Some(1024),
            _ => None,
        },
        EmbedderProvider::OpenAiCompatible => None,
    }
}
