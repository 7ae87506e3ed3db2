use crate::error::Result;
use crate::scanner::ScannedFile;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const MANIFEST_FILE_NAME: &str = "manifest";

/// Persistent `relPath -> contentHash` map used to detect added, modified
/// and deleted files between runs. One plain-text file per workspace:
/// `path<TAB>hash` lines, rewritten whole via temp-file-plus-rename.
#[derive(Debug, Default, Clone)]
pub struct Manifest {
    entries: HashMap<String, String>,
}

/// Outcome of diffing a disk scan against the manifest.
#[derive(Debug, Default)]
pub struct ManifestDelta {
    pub added: Vec<ScannedFile>,
    pub modified: Vec<ScannedFile>,
    pub deleted: Vec<String>,
}

impl ManifestDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Files that need chunking and re-embedding.
    #[must_use]
    pub fn changed(&self) -> Vec<ScannedFile> {
        self.added.iter().chain(&self.modified).cloned().collect()
    }
}

impl Manifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the manifest file; a missing file is an empty manifest.
    /// Malformed lines are skipped with a warning rather than aborting.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = tokio::fs::read_to_string(path).await?;
        let mut entries = HashMap::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((rel_path, hash)) if !rel_path.is_empty() && !hash.is_empty() => {
                    entries.insert(rel_path.to_string(), hash.to_string());
                }
                _ => log::warn!("Skipping malformed manifest line: {line:?}"),
            }
        }
        Ok(Self { entries })
    }

    /// Atomically rewrite the manifest file.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut lines: Vec<(&String, &String)> = self.entries.iter().collect();
        lines.sort_by(|a, b| a.0.cmp(b.0));
        let mut text = String::new();
        for (rel_path, hash) in lines {
            text.push_str(rel_path);
            text.push('\t');
            text.push_str(hash);
            text.push('\n');
        }

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    #[must_use]
    pub fn hash_for(&self, rel_path: &str) -> Option<&str> {
        self.entries.get(rel_path).map(String::as_str)
    }

    pub fn record(&mut self, rel_path: impl Into<String>, content_hash: impl Into<String>) {
        self.entries.insert(rel_path.into(), content_hash.into());
    }

    pub fn forget(&mut self, rel_path: &str) {
        self.entries.remove(rel_path);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Partition a scan into added / modified / deleted relative to the
    /// recorded hashes.
    #[must_use]
    pub fn diff(&self, scan: &[ScannedFile]) -> ManifestDelta {
        let mut delta = ManifestDelta::default();
        let mut live: HashSet<&str> = HashSet::with_capacity(scan.len());

        for file in scan {
            live.insert(file.rel_path.as_str());
            match self.entries.get(&file.rel_path) {
                None => delta.added.push(file.clone()),
                Some(recorded) if recorded != &file.content_hash => {
                    delta.modified.push(file.clone());
                }
                Some(_) => {}
            }
        }

        for rel_path in self.entries.keys() {
            if !live.contains(rel_path.as_str()) {
                delta.deleted.push(rel_path.clone());
            }
        }
        delta.deleted.sort();
        delta
    }
}

/// `<cacheRoot>/<hash(workspacePath)>/manifest`
#[must_use]
pub fn manifest_path(cache_root: &Path, workspace_path: &Path) -> PathBuf {
    let digest = Sha256::digest(workspace_path.to_string_lossy().as_bytes());
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    cache_root.join(hex).join(MANIFEST_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn scanned(rel: &str, hash: &str) -> ScannedFile {
        ScannedFile {
            abs_path: PathBuf::from(format!("/ws/{rel}")),
            rel_path: rel.to_string(),
            extension: "rs".to_string(),
            content_hash: hash.to_string(),
        }
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("manifest");

        let mut manifest = Manifest::new();
        manifest.record("src/lib.rs", "aa11");
        manifest.record("src/main.rs", "bb22");
        manifest.save(&path).await.unwrap();

        let loaded = Manifest::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.hash_for("src/lib.rs"), Some("aa11"));
        assert_eq!(loaded.hash_for("src/main.rs"), Some("bb22"));
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::load(&dir.path().join("nope")).await.unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn diff_partitions_added_modified_deleted() {
        let mut manifest = Manifest::new();
        manifest.record("a.rs", "a1");
        manifest.record("b.rs", "b1");
        manifest.record("c.rs", "c1");

        let scan = vec![
            scanned("a.rs", "a1"),  // unchanged
            scanned("b.rs", "b2"),  // modified
            scanned("d.rs", "d1"),  // added
        ];
        let delta = manifest.diff(&scan);

        assert_eq!(
            delta.added.iter().map(|f| f.rel_path.as_str()).collect::<Vec<_>>(),
            vec!["d.rs"]
        );
        assert_eq!(
            delta.modified.iter().map(|f| f.rel_path.as_str()).collect::<Vec<_>>(),
            vec!["b.rs"]
        );
        assert_eq!(delta.deleted, vec!["c.rs".to_string()]);
        assert_eq!(delta.changed().len(), 2);
    }

    #[test]
    fn unchanged_scan_diffs_empty() {
        let mut manifest = Manifest::new();
        manifest.record("a.rs", "a1");
        let delta = manifest.diff(&[scanned("a.rs", "a1")]);
        assert!(delta.is_empty());
    }

    #[test]
    fn manifest_path_is_per_workspace() {
        let cache = Path::new("/cache");
        let a = manifest_path(cache, Path::new("/ws/one"));
        let b = manifest_path(cache, Path::new("/ws/two"));
        assert_ne!(a, b);
        assert!(a.ends_with(Path::new("manifest")));
        assert!(a.starts_with(cache));
    }
}
