use crate::error::{IndexerError, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use semindex_code_chunker::Language;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

const ALWAYS_IGNORED: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
];

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet window after the last event before a delta is emitted.
    pub debounce: Duration,
    pub notify_poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            notify_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Coalesced filesystem changes for one debounce window. Paths are
/// absolute and deduplicated; a file that was modified and then deleted
/// appears only in `deleted`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchDelta {
    pub changed: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl WatchDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    /// Fold another delta into this one; used when changes arrive while
    /// an indexing run is still in flight.
    pub fn merge(&mut self, other: WatchDelta) {
        let mut changed: BTreeSet<PathBuf> = self.changed.drain(..).collect();
        let mut deleted: BTreeSet<PathBuf> = self.deleted.drain(..).collect();
        for path in other.changed {
            deleted.remove(&path);
            changed.insert(path);
        }
        for path in other.deleted {
            changed.remove(&path);
            deleted.insert(path);
        }
        self.changed = changed.into_iter().collect();
        self.deleted = deleted.into_iter().collect();
    }
}

/// Accumulates raw events during the debounce window.
#[derive(Debug, Default)]
struct DeltaBuilder {
    changed: BTreeSet<PathBuf>,
    deleted: BTreeSet<PathBuf>,
}

impl DeltaBuilder {
    fn record_changed(&mut self, path: PathBuf) {
        self.deleted.remove(&path);
        self.changed.insert(path);
    }

    fn record_deleted(&mut self, path: PathBuf) {
        // Modify-then-delete collapses to delete.
        self.changed.remove(&path);
        self.deleted.insert(path);
    }

    fn is_dirty(&self) -> bool {
        !self.changed.is_empty() || !self.deleted.is_empty()
    }

    fn take(&mut self) -> WatchDelta {
        WatchDelta {
            changed: std::mem::take(&mut self.changed).into_iter().collect(),
            deleted: std::mem::take(&mut self.deleted).into_iter().collect(),
        }
    }
}

/// Owns the native watcher and the debounce loop. Dropping the handle
/// stops both.
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
    delta_rx: mpsc::Receiver<WatchDelta>,
}

impl WorkspaceWatcher {
    /// Watch `root` recursively, emitting debounced deltas of relevant
    /// paths (supported extensions, not ignored, not gitignored).
    pub fn start(root: &Path, config: WatcherConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel::<notify::Result<Event>>(1024);
        let (delta_tx, delta_rx) = mpsc::channel::<WatchDelta>(16);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default().with_poll_interval(config.notify_poll_interval),
        )
        .map_err(|e| IndexerError::Other(format!("watcher init failed: {e}")))?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| IndexerError::Other(format!("failed to watch {}: {e}", root.display())))?;

        let gitignore = build_gitignore(root);
        spawn_debounce_loop(root.to_path_buf(), gitignore, config, event_rx, delta_tx);

        Ok(Self {
            _watcher: watcher,
            delta_rx,
        })
    }

    /// Next coalesced delta; `None` after the watcher shut down.
    pub async fn next_delta(&mut self) -> Option<WatchDelta> {
        self.delta_rx.recv().await
    }

    /// Deltas that accumulated while the caller was busy, without waiting.
    pub fn drain_pending(&mut self) -> Option<WatchDelta> {
        let mut merged: Option<WatchDelta> = None;
        while let Ok(delta) = self.delta_rx.try_recv() {
            match &mut merged {
                Some(m) => m.merge(delta),
                None => merged = Some(delta),
            }
        }
        merged
    }
}

fn build_gitignore(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    builder.add(root.join(".gitignore"));
    builder.build().unwrap_or_else(|e| {
        log::warn!("Failed to build gitignore matcher: {e}");
        Gitignore::empty()
    })
}

fn spawn_debounce_loop(
    root: PathBuf,
    gitignore: Gitignore,
    config: WatcherConfig,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    delta_tx: mpsc::Sender<WatchDelta>,
) {
    tokio::spawn(async move {
        let mut builder = DeltaBuilder::default();
        let mut deadline: Option<time::Instant> = None;

        loop {
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            if handle_event(&root, &gitignore, event, &mut builder) {
                                deadline = Some(time::Instant::now() + config.debounce);
                            }
                        }
                        Some(Err(e)) => log::warn!("Watcher error: {e}"),
                        None => break,
                    }
                }
                () = async {
                    if let Some(at) = deadline {
                        time::sleep_until(at).await;
                    }
                }, if deadline.is_some() && builder.is_dirty() => {
                    deadline = None;
                    let delta = builder.take();
                    log::debug!(
                        "Watcher delta: {} changed, {} deleted",
                        delta.changed.len(),
                        delta.deleted.len()
                    );
                    if delta_tx.send(delta).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn handle_event(
    root: &Path,
    gitignore: &Gitignore,
    event: Event,
    builder: &mut DeltaBuilder,
) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }

    let mut recorded = false;
    for path in event.paths {
        if !is_relevant_path(root, gitignore, &path) {
            continue;
        }
        // Rename-heavy editors report saves in many shapes; trust the
        // filesystem over the event kind.
        if matches!(event.kind, EventKind::Remove(_)) || !path.exists() {
            builder.record_deleted(path);
        } else {
            builder.record_changed(path);
        }
        recorded = true;
    }
    recorded
}

fn is_relevant_path(root: &Path, gitignore: &Gitignore, path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if Language::from_extension(&ext.to_lowercase()) == Language::Unknown {
        return false;
    }

    if let Ok(relative) = path.strip_prefix(root) {
        for component in relative.components() {
            let name = component.as_os_str().to_string_lossy();
            if ALWAYS_IGNORED.iter().any(|ignored| name == *ignored) {
                return false;
            }
        }
    }

    !gitignore.matched(path, false).is_ignore()
}
