//! Fingerprint persistence for generator invocations.
//!
//! The fingerprint records the exact argument vector of the last successful
//! generator run, one token per line, under the source tree's hidden
//! build-metadata directory. Its modification time doubles as the
//! "last generated at" timestamp.

use crate::error::GenerationError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Hidden build-metadata directory under a node's source directory.
pub const METADATA_DIR: &str = ".regen";

/// Fingerprint file name inside [`METADATA_DIR`].
pub const FINGERPRINT_NAME: &str = "genstamp";

#[derive(Debug, Clone)]
pub struct Fingerprint {
    path: PathBuf,
}

impl Fingerprint {
    /// Fingerprint location for a node's source directory.
    pub fn for_source_dir(srcdir: &Path) -> Self {
        Fingerprint {
            path: srcdir.join(METADATA_DIR).join(FINGERPRINT_NAME),
        }
    }

    /// Fingerprint at an explicit path.
    pub fn at(path: PathBuf) -> Self {
        Fingerprint { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// The recorded argument vector; `None` when the file is missing or
    /// unreadable. Callers treat `None` as "regenerate".
    pub fn recorded_args(&self) -> Option<Vec<String>> {
        let text = fs::read_to_string(&self.path).ok()?;
        Some(text.lines().map(str::to_string).collect())
    }

    /// Whether the recorded argument vector equals `candidate`, compared as
    /// ordered sequences.
    pub fn matches(&self, candidate: &[String]) -> bool {
        self.recorded_args()
            .map_or(false, |recorded| recorded == candidate)
    }

    /// Modification time of the fingerprint file.
    pub fn mtime(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    /// Atomically rewrite the fingerprint with `args`, one per line.
    /// Temp file + rename, so a crash never leaves a partial fingerprint.
    pub fn write(&self, args: &[String]) -> Result<(), GenerationError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, args.join("\n"))?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            GenerationError::Io(e)
        })?;
        Ok(())
    }

    /// Remove the fingerprint, forcing regeneration on the next evaluation.
    /// Removing an absent fingerprint is not an error.
    pub fn remove(&self) -> Result<(), GenerationError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GenerationError::Io(e)),
        }
    }
}
