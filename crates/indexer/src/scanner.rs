use crate::error::{IndexerError, Result};
use ignore::WalkBuilder;
use semindex_code_chunker::{content_hash_hex, Language};
use std::path::{Path, PathBuf};

/// Files larger than this are never indexed, whether discovered by a
/// full scan or by the watcher.
pub const MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Size gate shared by the scanner and the incremental watcher path.
#[must_use]
pub fn within_size_limit(len: u64) -> bool {
    len <= MAX_FILE_BYTES
}

/// Directories skipped regardless of gitignore contents.
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

/// One indexable file found on disk, hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
    /// Lowercased, without the leading dot.
    pub extension: String,
    /// sha-256/128 of the file bytes, hex.
    pub content_hash: String,
}

/// Workspace scanner: gitignore-aware walk filtered to extensions the
/// chunker understands, hashing file contents as it goes.
pub struct WorkspaceScanner {
    root: PathBuf,
}

impl WorkspaceScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Walk the workspace on a blocking thread and return the indexable
    /// files. Unreadable files are skipped with a warning.
    pub async fn scan(&self) -> Result<Vec<ScannedFile>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan_blocking(&root))
            .await
            .map_err(|e| IndexerError::Other(format!("scan task panicked: {e}")))?
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn scan_blocking(root: &Path) -> Result<Vec<ScannedFile>> {
    let mut files = Vec::new();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .require_git(false)
        .git_global(false)
        .git_ignore(true)
        .git_exclude(true)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !ALWAYS_IGNORED.iter().any(|ignored| name == *ignored)
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Scan error: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let extension = extension.to_lowercase();
        if Language::from_extension(&extension) == Language::Unknown {
            continue;
        }

        match std::fs::metadata(path) {
            Ok(meta) if !within_size_limit(meta.len()) => {
                log::debug!("Skipping oversized file {}", path.display());
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("Failed to stat {}: {e}", path.display());
                continue;
            }
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to read {}: {e}", path.display());
                continue;
            }
        };

        files.push(ScannedFile {
            abs_path: path.to_path_buf(),
            rel_path: normalize_rel_path(root, path),
            extension,
            content_hash: content_hash_hex(&bytes),
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

/// Workspace-relative path with forward slashes on every OS.
#[must_use]
pub fn normalize_rel_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut normalized = relative.to_string_lossy().to_string();
    if normalized.contains('\\') {
        normalized = normalized.replace('\\', "/");
    }
    normalized
}
