use crate::config::{ConfigController, ConfigSnapshot};
use crate::error::{IndexerError, Result};
use crate::manifest::{manifest_path, Manifest};
use crate::pipeline::{IndexSummary, IndexingPipeline, PipelineConfig};
use crate::scanner::{normalize_rel_path, within_size_limit, ScannedFile, WorkspaceScanner};
use crate::state::{IndexStatus, IndexerState, StateMachine};
use crate::watcher::{WatchDelta, WatcherConfig, WorkspaceWatcher};
use semindex_code_chunker::{content_hash_hex, file_outline, ChunkerConfig, CodeChunker};
use semindex_embedder::{Embedder, EmbedderProvider, HttpEmbedder};
use semindex_vector_store::{
    collection_name_for_workspace, QdrantClient, SearchMatch, VectorStore,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Builds an embedder from the effective snapshot. Swappable so tests can
/// run the whole indexer against in-memory fakes.
pub type EmbedderFactory =
    dyn Fn(&ConfigSnapshot) -> Result<Arc<dyn Embedder>> + Send + Sync;

/// Builds a vector-store client for one workspace from the snapshot.
pub type StoreFactory =
    dyn Fn(&ConfigSnapshot, &Path) -> Result<Arc<dyn VectorStore>> + Send + Sync;

/// Outcome of [`CodeIndexer::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOutcome {
    pub requires_restart: bool,
}

struct ActiveClients {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

/// Everything the indexer needs from its surroundings, passed explicitly
/// at construction.
pub struct IndexerDeps {
    pub workspace_root: PathBuf,
    pub cache_root: PathBuf,
    pub controller: Arc<ConfigController>,
}

/// Owns the pipeline, watcher, manifest and remote clients for one
/// workspace. The controller is shared read-only; configuration changes
/// go through [`CodeIndexer::initialize`], which reports whether the
/// running index had to be stopped.
pub struct CodeIndexer {
    workspace_root: PathBuf,
    cache_root: PathBuf,
    controller: Arc<ConfigController>,
    state: StateMachine,
    chunker_config: ChunkerConfig,
    pipeline_config: PipelineConfig,
    watcher_config: WatcherConfig,
    embedder_factory: Box<EmbedderFactory>,
    store_factory: Box<StoreFactory>,
    clients: Mutex<Option<ActiveClients>>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
    pending_full_rescan: AtomicBool,
}

impl CodeIndexer {
    /// Production wiring: HTTP embedder + Qdrant REST client.
    pub fn new(deps: IndexerDeps) -> Self {
        Self::with_factories(
            deps,
            Box::new(build_http_embedder),
            Box::new(|snapshot, workspace| {
                let collection = collection_name_for_workspace(workspace);
                let store: Arc<dyn VectorStore> = Arc::new(QdrantClient::new(
                    &snapshot.vector_store_url,
                    collection,
                    snapshot.vector_store_api_key.clone(),
                ));
                Ok(store)
            }),
        )
    }

    pub fn with_factories(
        deps: IndexerDeps,
        embedder_factory: Box<EmbedderFactory>,
        store_factory: Box<StoreFactory>,
    ) -> Self {
        Self {
            workspace_root: deps.workspace_root,
            cache_root: deps.cache_root,
            controller: deps.controller,
            state: StateMachine::new(),
            chunker_config: ChunkerConfig::default(),
            pipeline_config: PipelineConfig::default(),
            watcher_config: WatcherConfig::default(),
            embedder_factory,
            store_factory,
            clients: Mutex::new(None),
            watch_task: Mutex::new(None),
            pending_full_rescan: AtomicBool::new(false),
        }
    }

    /// Install a new configuration snapshot. When the change requires a
    /// restart, any running pipeline/watcher is stopped, the next
    /// `start_indexing` performs a full rescan, and the caller is told so
    /// it can re-trigger indexing.
    pub async fn initialize(&self, next: ConfigSnapshot) -> Result<InitOutcome> {
        let requires_restart = self.controller.apply(next);
        if requires_restart {
            log::info!("Configuration change requires index restart");
            self.stop_internal().await;
            self.pending_full_rescan.store(true, Ordering::Relaxed);
        }
        Ok(InitOutcome { requires_restart })
    }

    /// Run the initial scan to completion, then arm the file watcher.
    /// Rejected unless the controller reports enabled and configured.
    pub async fn start_indexing(&self) -> Result<IndexSummary> {
        let snapshot = self.controller.snapshot();
        if !snapshot.is_ready() {
            return Err(IndexerError::ConfigInvalid(
                "indexing is disabled or not fully configured".to_string(),
            ));
        }

        if self.state.state() == IndexerState::Error {
            self.state.to_standby();
        }
        // A full rescan throws away the manifest so every file re-embeds.
        let force_full = self.pending_full_rescan.swap(false, Ordering::Relaxed);

        let embedder = (self.embedder_factory)(&snapshot)?;
        let store = (self.store_factory)(&snapshot, &self.workspace_root)?;
        *self.clients.lock().await = Some(ActiveClients {
            embedder: embedder.clone(),
            store: store.clone(),
        });

        let dim = snapshot
            .resolved_dimension()
            .ok_or_else(|| IndexerError::ConfigInvalid("unresolvable dimension".to_string()))?;

        let recreated = match store.ensure_collection(dim).await {
            Ok(recreated) => recreated,
            Err(e) => {
                let error = IndexerError::from(e);
                self.state.fail(error.to_string());
                return Err(error);
            }
        };
        if recreated {
            log::info!("Collection dimension changed; forcing full reindex");
        }

        let manifest_file = manifest_path(&self.cache_root, &self.workspace_root);
        let mut manifest = if force_full || recreated {
            Manifest::new()
        } else {
            Manifest::load(&manifest_file).await?
        };

        let scanner = WorkspaceScanner::new(&self.workspace_root);
        let scan = scanner.scan().await?;
        let delta = manifest.diff(&scan);
        let changed = delta.changed();

        log::info!(
            "Initial scan: {} files, {} to index, {} deleted",
            scan.len(),
            changed.len(),
            delta.deleted.len()
        );

        self.state.begin_indexing(changed.len())?;

        let pipeline = Arc::new(IndexingPipeline::new(
            CodeChunker::new(self.chunker_config),
            embedder,
            store,
            self.pipeline_config,
        ));

        let summary = match pipeline
            .run(changed, delta.deleted, &mut manifest, &manifest_file, &self.state)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                self.state.fail(e.to_string());
                return Err(e);
            }
        };

        self.state.finish_indexing()?;
        self.arm_watcher(pipeline, manifest, manifest_file).await?;
        self.state.arm_watching()?;

        log::info!(
            "Indexing complete: {} files, {} chunks in {}ms",
            summary.files_processed,
            summary.chunks_indexed,
            summary.duration_ms
        );
        Ok(summary)
    }

    /// Semantic search over the workspace collection. Scores below the
    /// configured floor are dropped by the store.
    pub async fn search_index(&self, query: &str, limit: usize) -> Result<Vec<SearchMatch>> {
        let snapshot = self.controller.snapshot();
        if !snapshot.is_ready() {
            return Err(IndexerError::ConfigInvalid(
                "indexing is disabled or not fully configured".to_string(),
            ));
        }

        let (embedder, store) = {
            let guard = self.clients.lock().await;
            match guard.as_ref() {
                Some(active) => (active.embedder.clone(), active.store.clone()),
                None => (
                    (self.embedder_factory)(&snapshot)?,
                    (self.store_factory)(&snapshot, &self.workspace_root)?,
                ),
            }
        };

        let batch = embedder.embed(&[query.to_string()]).await?;
        let vector = batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| IndexerError::Other("embedder returned no query vector".to_string()))?;

        Ok(store
            .search(vector, limit, snapshot.search_min_score)
            .await?)
    }

    /// Definitions outline for one workspace file, in the
    /// `# basename` / `start--end | header` format.
    pub async fn file_outline(&self, rel_path: &str) -> Result<String> {
        let abs = self.workspace_root.join(rel_path);
        let bytes = tokio::fs::read(&abs).await?;
        let content = String::from_utf8_lossy(&bytes).to_string();
        let chunker = CodeChunker::new(self.chunker_config);
        Ok(file_outline(&chunker, rel_path, &content)?)
    }

    #[must_use]
    pub fn subscribe_progress(&self) -> watch::Receiver<IndexStatus> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn current_status(&self) -> IndexStatus {
        self.state.current()
    }

    /// Stop the watcher and any queued work; state returns to standby.
    pub async fn dispose(&self) {
        self.stop_internal().await;
        self.clients.lock().await.take();
    }

    async fn stop_internal(&self) {
        if let Some(task) = self.watch_task.lock().await.take() {
            task.abort();
        }
        self.state.to_standby();
    }

    /// Spawn the incremental loop: each debounced delta re-runs the
    /// pipeline for the affected paths. Deltas arriving while a run is in
    /// flight are merged and drained after it completes; the watcher
    /// never cancels a running pipeline.
    async fn arm_watcher(
        &self,
        pipeline: Arc<IndexingPipeline>,
        manifest: Manifest,
        manifest_file: PathBuf,
    ) -> Result<()> {
        let mut watcher = WorkspaceWatcher::start(&self.workspace_root, self.watcher_config.clone())?;
        let state = self.state.clone();
        let workspace_root = self.workspace_root.clone();

        let task = tokio::spawn(async move {
            let mut manifest = manifest;
            while let Some(mut delta) = watcher.next_delta().await {
                if let Some(pending) = watcher.drain_pending() {
                    delta.merge(pending);
                }
                if delta.is_empty() {
                    continue;
                }

                let (changed, deleted) = resolve_delta(&workspace_root, delta).await;
                log::info!(
                    "Incremental update: {} changed, {} deleted",
                    changed.len(),
                    deleted.len()
                );

                match pipeline
                    .run(changed, deleted, &mut manifest, &manifest_file, &state)
                    .await
                {
                    Ok(summary) => {
                        log::debug!(
                            "Incremental run: {} files, {} chunks in {}ms",
                            summary.files_processed,
                            summary.chunks_indexed,
                            summary.duration_ms
                        );
                    }
                    Err(e) => {
                        state.fail(e.to_string());
                        break;
                    }
                }
            }
        });

        *self.watch_task.lock().await = Some(task);
        Ok(())
    }
}

/// Turn watcher paths into scan entries: changed files are re-read and
/// re-hashed; files that vanished midway are treated as deleted. The
/// scanner's size cap applies here too, so a file that grew past it
/// drops out of the index exactly as it would on a full scan.
async fn resolve_delta(
    workspace_root: &Path,
    delta: WatchDelta,
) -> (Vec<ScannedFile>, Vec<String>) {
    let mut changed = Vec::with_capacity(delta.changed.len());
    let mut deleted: Vec<String> = delta
        .deleted
        .iter()
        .map(|p| normalize_rel_path(workspace_root, p))
        .collect();

    for abs_path in delta.changed {
        match tokio::fs::metadata(&abs_path).await {
            Ok(meta) if !within_size_limit(meta.len()) => {
                log::debug!("Skipping oversized file {}", abs_path.display());
                deleted.push(normalize_rel_path(workspace_root, &abs_path));
                continue;
            }
            Ok(_) => {}
            Err(_) => {
                deleted.push(normalize_rel_path(workspace_root, &abs_path));
                continue;
            }
        }

        match tokio::fs::read(&abs_path).await {
            Ok(bytes) => {
                let extension = abs_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_lowercase();
                changed.push(ScannedFile {
                    rel_path: normalize_rel_path(workspace_root, &abs_path),
                    extension,
                    content_hash: content_hash_hex(&bytes),
                    abs_path,
                });
            }
            Err(_) => deleted.push(normalize_rel_path(workspace_root, &abs_path)),
        }
    }

    (changed, deleted)
}

fn build_http_embedder(snapshot: &ConfigSnapshot) -> Result<Arc<dyn Embedder>> {
    let endpoint = snapshot.embedder_endpoint.as_deref();
    let api_key = snapshot.embedder_api_key.clone().unwrap_or_default();

    let embedder = match snapshot.embedder_provider {
        EmbedderProvider::OpenAi => {
            HttpEmbedder::openai(endpoint, api_key, snapshot.model_id.clone())?
        }
        EmbedderProvider::Ollama => HttpEmbedder::ollama(endpoint, snapshot.model_id.clone())?,
        EmbedderProvider::OpenAiCompatible => {
            let endpoint = endpoint.ok_or_else(|| {
                IndexerError::ConfigInvalid("openai-compatible endpoint missing".to_string())
            })?;
            let dimension = snapshot.embedder_dimension.ok_or_else(|| {
                IndexerError::ConfigInvalid("openai-compatible dimension missing".to_string())
            })?;
            HttpEmbedder::openai_compatible(endpoint, api_key, snapshot.model_id.clone(), dimension)
        }
    };
    Ok(Arc::new(embedder))
}
