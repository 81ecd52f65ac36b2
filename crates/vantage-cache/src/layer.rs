//! The cache layer: existence-checked lookup, write-once record, variant
//! discovery, and category purge.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::key::{ArtifactCategory, CacheKey};

/// Cache I/O errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Creating or removing a category directory failed.
    #[error("cache directory I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps artifact keys to already-generated files on disk.
///
/// The in-memory index only memoizes what this process recorded; `lookup`
/// always consults the filesystem, so artifacts from previous sessions hit
/// too. A hit means the scheduler applies the path directly and the worker
/// pool is never involved.
#[derive(Debug)]
pub struct CacheLayer {
    base_dir: PathBuf,
    category: ArtifactCategory,
    index: FxHashMap<CacheKey, PathBuf>,
}

impl CacheLayer {
    /// Create a cache over `base_dir` for one category of artifacts.
    pub fn new(base_dir: PathBuf, category: ArtifactCategory) -> Self {
        Self {
            base_dir,
            category,
            index: FxHashMap::default(),
        }
    }

    /// The category directory this cache writes into.
    pub fn category_dir(&self) -> PathBuf {
        self.base_dir.join(self.category.dir_name())
    }

    /// Create the category directory if needed.
    pub fn ensure_dir(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(self.category_dir())?;
        Ok(())
    }

    /// The path an artifact for `key` would live at, whether or not it exists.
    pub fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        key.artifact_path(&self.base_dir, self.category)
    }

    /// Look up an existing artifact.
    ///
    /// No validation against the current source file happens here: if the
    /// source was swapped since the artifact was generated, the stale
    /// artifact is returned anyway (accepted limitation).
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.artifact_path(key);
        if path.exists() {
            debug!(artifact = %path.display(), "cache hit");
            Some(path)
        } else {
            None
        }
    }

    /// Record a freshly generated artifact. Entries are write-once: a second
    /// record for the same key is ignored and `false` is returned.
    pub fn record(&mut self, key: CacheKey, path: PathBuf) -> bool {
        use std::collections::hash_map::Entry;
        match self.index.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(path);
                true
            }
        }
    }

    /// Number of artifacts recorded by this process.
    pub fn recorded(&self) -> usize {
        self.index.len()
    }
}

/// Find an artifact in a category directory whose name starts with
/// `{source_stem}_` (the variant-switching match used when the exact target
/// size is unknown).
pub fn find_variant(
    base_dir: &Path,
    category: ArtifactCategory,
    source_stem: &str,
) -> Option<PathBuf> {
    let dir = base_dir.join(category.dir_name());
    let prefix = format!("{source_stem}_");
    let entries = std::fs::read_dir(&dir).ok()?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix))
        })
        .collect();
    // Deterministic choice when multiple sizes exist.
    matches.sort();
    matches.into_iter().next()
}

/// List the variant category directories that exist under a project dir.
pub fn existing_categories(base_dir: &Path) -> Vec<ArtifactCategory> {
    let Ok(entries) = std::fs::read_dir(base_dir) else {
        return Vec::new();
    };
    let mut found: Vec<(String, ArtifactCategory)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            ArtifactCategory::parse_dir_name(&name).map(|c| (name, c))
        })
        .collect();
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found.into_iter().map(|(_, c)| c).collect()
}

/// Delete a category directory and everything in it. Returns `true` if the
/// directory existed. Callers are responsible for repointing any entity that
/// still references an artifact inside it *before* purging.
pub fn purge_category(base_dir: &Path, category: ArtifactCategory) -> Result<bool, CacheError> {
    let dir = base_dir.join(category.dir_name());
    if !dir.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(&dir)?;
    debug!(dir = %dir.display(), "purged variant category");
    Ok(true)
}
