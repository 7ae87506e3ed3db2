use crate::error::{IndexerError, Result};
use crate::manifest::Manifest;
use crate::scanner::ScannedFile;
use crate::state::StateMachine;
use semindex_code_chunker::{CodeChunk, CodeChunker};
use semindex_embedder::Embedder;
use semindex_vector_store::{PointPayload, VectorPoint, VectorStore};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;

/// Stage parallelism and batching limits.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Files chunked concurrently.
    pub parallel_files: usize,
    /// Embed calls in flight.
    pub parallel_batches: usize,
    /// Chunks per embed batch.
    pub batch_max_chunks: usize,
    /// Total text bytes per embed batch.
    pub batch_max_bytes: usize,
    /// Bounded queue depth between stages.
    pub queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_files: 4,
            parallel_batches: 2,
            batch_max_chunks: 64,
            batch_max_bytes: 50 * 1024,
            queue_depth: 4,
        }
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub chunks_indexed: usize,
    pub files_deleted: usize,
    pub duration_ms: u64,
}

enum ChunkMsg {
    Chunked {
        file: ScannedFile,
        chunks: Vec<CodeChunk>,
    },
    Failed {
        file: ScannedFile,
        error: String,
    },
}

struct EmbedJob {
    chunks: Vec<CodeChunk>,
    bytes: usize,
}

impl EmbedJob {
    fn new() -> Self {
        Self {
            chunks: Vec::new(),
            bytes: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

enum UpsertMsg {
    Embedded {
        points: Vec<VectorPoint>,
        rel_paths: Vec<String>,
    },
    EmbedFailed {
        rel_paths: Vec<String>,
        error: String,
    },
}

#[derive(Default)]
struct FileProgress {
    content_hash: String,
    /// Total chunks for the file, known once the chunk stage finished it.
    expected: Option<usize>,
    upserted: usize,
    failed: bool,
}

/// Per-file completion tracking shared between the batch and upsert
/// stages. A file's manifest entry is recorded only after every one of
/// its chunks has been durably upserted.
#[derive(Default)]
struct FileTracker {
    files: HashMap<String, FileProgress>,
    completed: Vec<(String, String)>,
}

impl FileTracker {
    fn file_chunked(&mut self, file: &ScannedFile, chunk_count: usize) {
        let progress = self.files.entry(file.rel_path.clone()).or_default();
        progress.content_hash = file.content_hash.clone();
        progress.expected = Some(chunk_count);
        self.check_complete(&file.rel_path);
    }

    fn chunk_upserted(&mut self, rel_path: &str) {
        let progress = self.files.entry(rel_path.to_string()).or_default();
        progress.upserted += 1;
        self.check_complete(rel_path);
    }

    fn file_failed(&mut self, rel_path: &str) {
        self.files.entry(rel_path.to_string()).or_default().failed = true;
    }

    fn check_complete(&mut self, rel_path: &str) {
        let Some(progress) = self.files.get(rel_path) else {
            return;
        };
        if !progress.failed && progress.expected == Some(progress.upserted) {
            self.completed
                .push((rel_path.to_string(), progress.content_hash.clone()));
        }
    }

    fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

/// Staged indexing pipeline: chunk -> batch -> embed -> upsert -> manifest,
/// with bounded queues between stages for backpressure.
pub struct IndexingPipeline {
    chunker: Arc<CodeChunker>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    config: PipelineConfig,
}

impl IndexingPipeline {
    pub fn new(
        chunker: CodeChunker,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            chunker: Arc::new(chunker),
            embedder,
            store,
            config,
        }
    }

    /// Process a set of changed files plus deletions, updating `manifest`
    /// in memory and persisting it at `manifest_path` once the run's
    /// surviving files are durable.
    ///
    /// Failure semantics: a file that fails to chunk is skipped; an embed
    /// batch that fails after retries withholds its files from the
    /// manifest and surfaces after the run; a vector-store failure aborts
    /// immediately with no manifest write.
    pub async fn run(
        &self,
        files: Vec<ScannedFile>,
        deleted: Vec<String>,
        manifest: &mut Manifest,
        manifest_path: &Path,
        state: &StateMachine,
    ) -> Result<IndexSummary> {
        let started = Instant::now();
        let mut summary = IndexSummary::default();
        let total_files = files.len();

        // Deletions first so a replaced file never serves stale vectors.
        for rel_path in &deleted {
            self.store.delete_by_file_path(rel_path).await?;
            manifest.forget(rel_path);
            summary.files_deleted += 1;
        }

        if files.is_empty() {
            if !deleted.is_empty() {
                manifest.save(manifest_path).await?;
            }
            summary.duration_ms = elapsed_ms(started);
            return Ok(summary);
        }

        let tracker = Arc::new(Mutex::new(FileTracker::default()));
        let aborted = Arc::new(AtomicBool::new(false));
        let (chunk_tx, chunk_rx) = mpsc::channel::<ChunkMsg>(self.config.queue_depth.max(1));
        let (batch_tx, batch_rx) = mpsc::channel::<EmbedJob>(self.config.queue_depth.max(1));
        let (upsert_tx, upsert_rx) = mpsc::channel::<UpsertMsg>(self.config.queue_depth.max(1));

        let chunk_stage = self.spawn_chunk_stage(files, chunk_tx);
        let batch_stage = self.spawn_batch_stage(chunk_rx, batch_tx, tracker.clone());
        let embed_stage = self.spawn_embed_stage(batch_rx, upsert_tx, aborted.clone());
        let upsert_stage =
            self.spawn_upsert_stage(upsert_rx, tracker.clone(), state, total_files, aborted);

        let chunk_outcome = chunk_stage.await;
        let batch_outcome = batch_stage.await;
        let embed_outcome = embed_stage.await;
        let upsert_outcome = upsert_stage.await;

        let chunk_failures =
            chunk_outcome.map_err(|e| IndexerError::Other(format!("chunk stage panicked: {e}")))?;
        batch_outcome.map_err(|e| IndexerError::Other(format!("batch stage panicked: {e}")))?;
        embed_outcome.map_err(|e| IndexerError::Other(format!("embed stage panicked: {e}")))?;
        let (points_upserted, embed_errors, store_error) = upsert_outcome
            .map_err(|e| IndexerError::Other(format!("upsert stage panicked: {e}")))?;

        // A store failure aborts the run before any manifest mutation.
        if let Some(error) = store_error {
            return Err(error);
        }

        let tracker = tracker.lock().await;
        for (rel_path, content_hash) in &tracker.completed {
            manifest.record(rel_path.clone(), content_hash.clone());
        }
        manifest.save(manifest_path).await?;

        summary.files_processed = tracker.completed_count();
        summary.files_failed = chunk_failures + embed_errors.len();
        summary.chunks_indexed = points_upserted;
        summary.duration_ms = elapsed_ms(started);

        // Embed failures surface after the surviving files are persisted;
        // the withheld manifest entries make those files retry next run.
        if let Some(first) = embed_errors.into_iter().next() {
            return Err(IndexerError::EmbedderError(
                semindex_embedder::EmbedderError::Permanent(first),
            ));
        }

        Ok(summary)
    }

    /// Stage 1: chunk up to `parallel_files` files concurrently. Parsing
    /// is CPU-bound and runs on the blocking pool.
    fn spawn_chunk_stage(
        &self,
        files: Vec<ScannedFile>,
        chunk_tx: mpsc::Sender<ChunkMsg>,
    ) -> tokio::task::JoinHandle<usize> {
        let chunker = self.chunker.clone();
        let semaphore = Arc::new(Semaphore::new(self.config.parallel_files.max(1)));

        tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            for file in files {
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("semaphore closed");
                let chunker = chunker.clone();
                let chunk_tx = chunk_tx.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    let msg = chunk_one_file(&chunker, file).await;
                    let failed = matches!(msg, ChunkMsg::Failed { .. });
                    let _ = chunk_tx.send(msg).await;
                    usize::from(failed)
                });
            }

            let mut failures = 0;
            while let Some(joined) = tasks.join_next().await {
                failures += joined.unwrap_or(1);
            }
            failures
        })
    }

    /// Stage 2: accumulate chunks into embed batches, flushing at the
    /// chunk or byte cap. Also records per-file expected chunk counts.
    fn spawn_batch_stage(
        &self,
        mut chunk_rx: mpsc::Receiver<ChunkMsg>,
        batch_tx: mpsc::Sender<EmbedJob>,
        tracker: Arc<Mutex<FileTracker>>,
    ) -> tokio::task::JoinHandle<()> {
        let max_chunks = self.config.batch_max_chunks.max(1);
        let max_bytes = self.config.batch_max_bytes.max(1);

        tokio::spawn(async move {
            let mut job = EmbedJob::new();

            while let Some(msg) = chunk_rx.recv().await {
                match msg {
                    ChunkMsg::Chunked { file, chunks } => {
                        tracker.lock().await.file_chunked(&file, chunks.len());
                        for chunk in chunks {
                            let chunk_bytes = chunk.text.len();
                            let would_overflow = job.chunks.len() + 1 > max_chunks
                                || job.bytes + chunk_bytes > max_bytes;
                            if would_overflow && !job.is_empty() {
                                let full = std::mem::replace(&mut job, EmbedJob::new());
                                if batch_tx.send(full).await.is_err() {
                                    return;
                                }
                            }
                            job.bytes += chunk_bytes;
                            job.chunks.push(chunk);
                        }
                    }
                    ChunkMsg::Failed { file, error } => {
                        log::warn!("Skipping {}: {error}", file.rel_path);
                        tracker.lock().await.file_failed(&file.rel_path);
                    }
                }
            }

            if !job.is_empty() {
                let _ = batch_tx.send(job).await;
            }
        })
    }

    /// Stage 3: up to `parallel_batches` embed calls in flight.
    fn spawn_embed_stage(
        &self,
        mut batch_rx: mpsc::Receiver<EmbedJob>,
        upsert_tx: mpsc::Sender<UpsertMsg>,
        aborted: Arc<AtomicBool>,
    ) -> tokio::task::JoinHandle<()> {
        let embedder = self.embedder.clone();
        let semaphore = Arc::new(Semaphore::new(self.config.parallel_batches.max(1)));

        tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            while let Some(job) = batch_rx.recv().await {
                if aborted.load(Ordering::Relaxed) {
                    continue;
                }
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("semaphore closed");
                let embedder = embedder.clone();
                let upsert_tx = upsert_tx.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    let msg = embed_batch(&*embedder, job).await;
                    let _ = upsert_tx.send(msg).await;
                });
            }
            while tasks.join_next().await.is_some() {}
        })
    }

    /// Stage 4: single writer to the vector store. Returns the upserted
    /// point count, the embed errors collected along the way, and the
    /// fatal store error if the run aborted.
    fn spawn_upsert_stage(
        &self,
        mut upsert_rx: mpsc::Receiver<UpsertMsg>,
        tracker: Arc<Mutex<FileTracker>>,
        state: &StateMachine,
        total_files: usize,
        aborted: Arc<AtomicBool>,
    ) -> tokio::task::JoinHandle<(usize, Vec<String>, Option<IndexerError>)> {
        let store = self.store.clone();
        let state = state.clone();

        tokio::spawn(async move {
            let mut points_upserted = 0usize;
            let mut embed_errors = Vec::new();

            while let Some(msg) = upsert_rx.recv().await {
                match msg {
                    UpsertMsg::Embedded { points, rel_paths } => {
                        let count = points.len();
                        if let Err(e) = store.upsert_points(points).await {
                            // Fatal: stop issuing work, abort the run.
                            aborted.store(true, Ordering::Relaxed);
                            return (points_upserted, embed_errors, Some(e.into()));
                        }
                        points_upserted += count;

                        let mut guard = tracker.lock().await;
                        for rel_path in &rel_paths {
                            guard.chunk_upserted(rel_path);
                        }
                        let processed = guard.completed_count();
                        drop(guard);
                        state.report_progress(
                            processed,
                            total_files,
                            format!("indexed {processed}/{total_files} files"),
                        );
                    }
                    UpsertMsg::EmbedFailed { rel_paths, error } => {
                        log::warn!("Embed batch failed, dropping from run: {error}");
                        let mut guard = tracker.lock().await;
                        for rel_path in rel_paths {
                            guard.file_failed(&rel_path);
                        }
                        drop(guard);
                        embed_errors.push(error);
                    }
                }
            }

            (points_upserted, embed_errors, None)
        })
    }
}

async fn chunk_one_file(chunker: &Arc<CodeChunker>, file: ScannedFile) -> ChunkMsg {
    let bytes = match tokio::fs::read(&file.abs_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ChunkMsg::Failed {
                error: format!("read failed: {e}"),
                file,
            };
        }
    };

    let chunker = chunker.clone();
    let rel_path = file.rel_path.clone();
    let parsed = tokio::task::spawn_blocking(move || chunker.chunk_bytes(&bytes, &rel_path)).await;

    match parsed {
        Ok(Ok(chunks)) => ChunkMsg::Chunked { file, chunks },
        Ok(Err(e)) => ChunkMsg::Failed {
            error: e.to_string(),
            file,
        },
        Err(e) => ChunkMsg::Failed {
            error: format!("chunk task panicked: {e}"),
            file,
        },
    }
}

async fn embed_batch(embedder: &dyn Embedder, job: EmbedJob) -> UpsertMsg {
    let texts: Vec<String> = job.chunks.iter().map(|c| c.text.clone()).collect();
    let rel_paths: Vec<String> = job.chunks.iter().map(|c| c.rel_path.clone()).collect();

    match embedder.embed(&texts).await {
        Ok(batch) => {
            let points = job
                .chunks
                .iter()
                .zip(batch.vectors)
                .map(|(chunk, vector)| VectorPoint {
                    id: chunk.chunk_id.clone(),
                    vector,
                    // Line numbers are 1-based in stored payloads.
                    payload: PointPayload {
                        file_path: chunk.rel_path.clone(),
                        start_line: chunk.start_line + 1,
                        end_line: chunk.end_line + 1,
                        code_chunk: chunk.text.clone(),
                        content_hash: chunk.content_hash.clone(),
                    },
                })
                .collect();
            UpsertMsg::Embedded { points, rel_paths }
        }
        Err(e) => UpsertMsg::EmbedFailed {
            rel_paths,
            error: e.to_string(),
        },
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
