use semindex_embedder::{model_dimension, EmbedderProvider};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

pub const DEFAULT_SEARCH_MIN_SCORE: f32 = 0.4;

/// Effective indexing configuration at one point in time. The controller
/// keeps the previous snapshot to diff against; consumers always get a
/// copy, never a reference into the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub enabled: bool,
    pub embedder_provider: EmbedderProvider,
    pub model_id: String,
    #[serde(default)]
    pub embedder_endpoint: Option<String>,
    #[serde(default)]
    pub embedder_api_key: Option<String>,
    /// Only meaningful for the openai-compatible provider.
    #[serde(default)]
    pub embedder_dimension: Option<usize>,
    pub vector_store_url: String,
    #[serde(default)]
    pub vector_store_api_key: Option<String>,
    #[serde(default = "default_search_min_score")]
    pub search_min_score: f32,
}

fn default_search_min_score() -> f32 {
    DEFAULT_SEARCH_MIN_SCORE
}

impl ConfigSnapshot {
    /// Embedding dimension for the configured provider/model, from the
    /// static model table or (openai-compatible) explicit configuration.
    #[must_use]
    pub fn resolved_dimension(&self) -> Option<usize> {
        match self.embedder_provider {
            EmbedderProvider::OpenAiCompatible => self.embedder_dimension,
            provider => model_dimension(provider, &self.model_id),
        }
    }

    /// Whether every field the active provider needs is present. A
    /// snapshot whose dimension cannot be resolved is never configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        if self.vector_store_url.is_empty() || self.model_id.is_empty() {
            return false;
        }
        if self.resolved_dimension().is_none() {
            return false;
        }
        match self.embedder_provider {
            EmbedderProvider::OpenAi => has_value(&self.embedder_api_key),
            EmbedderProvider::Ollama => true,
            EmbedderProvider::OpenAiCompatible => {
                has_value(&self.embedder_endpoint) && has_value(&self.embedder_api_key)
            }
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.enabled && self.is_configured()
    }
}

fn has_value(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.is_empty())
}

/// Whether switching from `prev` to `next` must stop and rebuild the
/// running index. Comparing a snapshot to itself is always false.
#[must_use]
pub fn requires_restart(prev: &ConfigSnapshot, next: &ConfigSnapshot) -> bool {
    // Becoming ready is always a (re)start.
    if !prev.is_ready() && next.is_ready() {
        return true;
    }
    if !prev.enabled && !next.enabled {
        return false;
    }
    if !prev.is_configured() && !next.is_configured() {
        return false;
    }

    if prev.embedder_provider != next.embedder_provider {
        return true;
    }

    // Dimension changes force a collection rebuild; unresolvable
    // dimensions are treated as changed.
    match (prev.resolved_dimension(), next.resolved_dimension()) {
        (Some(a), Some(b)) if a == b => {}
        _ => return true,
    }

    let credentials_changed = match next.embedder_provider {
        EmbedderProvider::OpenAi => prev.embedder_api_key != next.embedder_api_key,
        EmbedderProvider::Ollama => prev.embedder_endpoint != next.embedder_endpoint,
        EmbedderProvider::OpenAiCompatible => {
            prev.embedder_endpoint != next.embedder_endpoint
                || prev.embedder_api_key != next.embedder_api_key
                || prev.embedder_dimension != next.embedder_dimension
        }
    };
    if credentials_changed {
        return true;
    }

    prev.vector_store_url != next.vector_store_url
        || prev.vector_store_api_key != next.vector_store_api_key
}

/// Holds the effective snapshot; reads copy, writes diff against the
/// previous value and report whether the indexer must restart.
pub struct ConfigController {
    snapshot: RwLock<ConfigSnapshot>,
}

impl ConfigController {
    pub fn new(initial: ConfigSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(initial),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.snapshot.read().expect("config lock poisoned").clone()
    }

    /// Install a new snapshot, returning true when the change requires
    /// stopping and rebuilding the running index.
    pub fn apply(&self, next: ConfigSnapshot) -> bool {
        let mut guard = self.snapshot.write().expect("config lock poisoned");
        let restart = requires_restart(&guard, &next);
        *guard = next;
        restart
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.snapshot.read().expect("config lock poisoned").is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ollama_snapshot() -> ConfigSnapshot {
        ConfigSnapshot {
            enabled: true,
            embedder_provider: EmbedderProvider::Ollama,
            model_id: "nomic-embed-text".to_string(),
            embedder_endpoint: Some("http://localhost:11434".to_string()),
            embedder_api_key: None,
            embedder_dimension: None,
            vector_store_url: "http://localhost:6333".to_string(),
            vector_store_api_key: None,
            search_min_score: DEFAULT_SEARCH_MIN_SCORE,
        }
    }

    #[test]
    fn comparing_a_snapshot_to_itself_never_restarts() {
        let ready = ollama_snapshot();
        assert!(!requires_restart(&ready, &ready));

        let mut disabled = ollama_snapshot();
        disabled.enabled = false;
        assert!(!requires_restart(&disabled, &disabled));

        let mut unconfigured = ollama_snapshot();
        unconfigured.vector_store_url = String::new();
        assert!(!requires_restart(&unconfigured, &unconfigured));

        let mut unresolvable = ollama_snapshot();
        unresolvable.model_id = "mystery-model".to_string();
        assert!(!requires_restart(&unresolvable, &unresolvable));
    }

    #[test]
    fn becoming_ready_requires_restart() {
        let mut prev = ollama_snapshot();
        prev.enabled = false;
        let next = ollama_snapshot();
        assert!(requires_restart(&prev, &next));

        let mut prev = ollama_snapshot();
        prev.vector_store_url = String::new();
        assert!(requires_restart(&prev, &ollama_snapshot()));
    }

    #[test]
    fn provider_change_requires_restart() {
        let prev = ollama_snapshot();
        let mut next = ollama_snapshot();
        next.embedder_provider = EmbedderProvider::OpenAi;
        next.model_id = "text-embedding-3-small".to_string();
        next.embedder_api_key = Some("sk-live".to_string());
        assert!(requires_restart(&prev, &next));
    }

    #[test]
    fn dimension_change_requires_restart() {
        let prev = ollama_snapshot(); // 768
        let mut next = ollama_snapshot();
        next.model_id = "mxbai-embed-large".to_string(); // 1024
        assert!(requires_restart(&prev, &next));
    }

    #[test]
    fn same_dimension_model_swap_does_not_restart() {
        let prev = ollama_snapshot(); // nomic-embed-text, 768
        let next = ollama_snapshot();
        assert!(!requires_restart(&prev, &next));
    }

    #[test]
    fn active_provider_credential_changes_require_restart() {
        let prev = ollama_snapshot();
        let mut next = ollama_snapshot();
        next.embedder_endpoint = Some("http://gpu-box:11434".to_string());
        assert!(requires_restart(&prev, &next));

        let mut openai_prev = ollama_snapshot();
        openai_prev.embedder_provider = EmbedderProvider::OpenAi;
        openai_prev.model_id = "text-embedding-3-small".to_string();
        openai_prev.embedder_api_key = Some("sk-a".to_string());
        let mut openai_next = openai_prev.clone();
        openai_next.embedder_api_key = Some("sk-b".to_string());
        assert!(requires_restart(&openai_prev, &openai_next));
    }

    #[test]
    fn vector_store_changes_require_restart() {
        let prev = ollama_snapshot();
        let mut next = ollama_snapshot();
        next.vector_store_url = "http://other:6333".to_string();
        assert!(requires_restart(&prev, &next));

        let mut next = ollama_snapshot();
        next.vector_store_api_key = Some("secret".to_string());
        assert!(requires_restart(&prev, &next));
    }

    #[test]
    fn both_disabled_never_restarts() {
        let mut prev = ollama_snapshot();
        prev.enabled = false;
        let mut next = ollama_snapshot();
        next.enabled = false;
        next.vector_store_url = "http://other:6333".to_string();
        assert!(!requires_restart(&prev, &next));
    }

    #[test]
    fn controller_applies_and_reports() {
        let controller = ConfigController::new(ollama_snapshot());
        assert!(controller.is_ready());

        let mut next = ollama_snapshot();
        next.model_id = "mxbai-embed-large".to_string();
        assert!(controller.apply(next.clone()));
        assert_eq!(controller.snapshot(), next);
    }

    #[test]
    fn snapshot_parses_from_camel_case_document() {
        let doc = r#"{
            "enabled": true,
            "embedderProvider": "ollama",
            "modelId": "nomic-embed-text",
            "vectorStoreUrl": "http://localhost:6333"
        }"#;
        let snapshot: ConfigSnapshot = serde_json::from_str(doc).unwrap();
        assert!(snapshot.is_ready());
        assert_eq!(snapshot.search_min_score, DEFAULT_SEARCH_MIN_SCORE);
        assert_eq!(snapshot.resolved_dimension(), Some(768));
    }
}
