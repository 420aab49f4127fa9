//! Deterministic source-tree collection for prerequisite sets.

use crate::error::GenerationError;
use crate::fingerprint::METADATA_DIR;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// The files under a node's source directory, used as the prerequisite set
/// of its fingerprint node: any source edit re-triggers the staleness check.
pub struct SourceTree {
    root: PathBuf,
    ignore_patterns: Vec<String>,
}

impl SourceTree {
    /// Create a source tree rooted at `root` with the default ignore set
    /// (version control metadata, the build directory, and the hidden
    /// build-metadata directory).
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ignore_patterns: vec![
                ".git".to_string(),
                ".svn".to_string(),
                "build".to_string(),
                METADATA_DIR.to_string(),
            ],
        }
    }

    pub fn with_ignore_patterns(root: PathBuf, ignore_patterns: Vec<String>) -> Self {
        Self {
            root,
            ignore_patterns,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect all files under the root, sorted by path for determinism.
    pub fn files(&self) -> Result<Vec<PathBuf>, GenerationError> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_ignored(entry.path()));

        for entry in walker {
            let entry = entry.map_err(|e| {
                GenerationError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to walk {:?}: {}", self.root, e),
                ))
            })?;
            if entry.file_type().is_file() {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Newest modification time among the tree's files; `None` when the
    /// root does not exist or holds no files.
    pub fn newest_mtime(&self) -> Option<SystemTime> {
        self.files()
            .ok()?
            .iter()
            .filter_map(|path| path.metadata().ok()?.modified().ok())
            .max()
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        self.ignore_patterns
            .iter()
            .any(|pattern| name.to_string_lossy() == pattern.as_str())
    }
}

/// Newest modification time anywhere under `root`, directories included.
/// Best effort: unreadable entries are skipped, a missing root yields `None`.
pub fn newest_mtime(root: &Path) -> Option<SystemTime> {
    if !root.exists() {
        return None;
    }
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok()?.modified().ok())
        .max()
}
