//! # Indexer
//!
//! Continuous semantic indexing of a workspace.
//!
//! ## Pipeline
//!
//! ```text
//! Workspace
//!     │
//!     ├──> Scanner (.gitignore aware, supported extensions, hashed)
//!     │      └─> Manifest diff: added / modified / deleted
//!     │
//!     ├──> Chunk stage (4 files in parallel)
//!     │      └─> Batch stage (64 chunks / 50 KiB)
//!     │             └─> Embed stage (2 batches in flight)
//!     │                    └─> Upsert stage (single writer)
//!     │                           └─> Manifest stage (per-file durability)
//!     │
//!     └──> Watcher (500 ms debounce) --> incremental deltas
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use semindex_indexer::{CodeIndexer, ConfigController, ConfigSnapshot, IndexerDeps};
//! use std::sync::Arc;
//!
//! # async fn run(snapshot: ConfigSnapshot) -> semindex_indexer::Result<()> {
//! let controller = Arc::new(ConfigController::new(snapshot));
//! let indexer = CodeIndexer::new(IndexerDeps {
//!     workspace_root: "/path/to/workspace".into(),
//!     cache_root: "/path/to/cache".into(),
//!     controller,
//! });
//!
//! indexer.start_indexing().await?;
//! let hits = indexer.search_index("parse configuration file", 10).await?;
//! println!("{} hits", hits.len());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod indexer;
mod manifest;
mod pipeline;
mod scanner;
mod state;
mod watcher;

pub use config::{
    requires_restart, ConfigController, ConfigSnapshot, DEFAULT_SEARCH_MIN_SCORE,
};
pub use error::{IndexerError, Result};
pub use indexer::{CodeIndexer, EmbedderFactory, IndexerDeps, InitOutcome, StoreFactory};
pub use manifest::{manifest_path, Manifest, ManifestDelta};
pub use pipeline::{IndexSummary, IndexingPipeline, PipelineConfig};
pub use scanner::{
    normalize_rel_path, within_size_limit, ScannedFile, WorkspaceScanner, MAX_FILE_BYTES,
};
pub use state::{IndexStatus, IndexerState, StateMachine};
pub use watcher::{WatchDelta, WatcherConfig, WorkspaceWatcher};
