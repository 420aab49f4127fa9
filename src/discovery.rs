//! Specification-file discovery.

use crate::error::GenerationError;
use std::path::{Path, PathBuf};

/// Extension of generator specification files.
pub const SPEC_EXTENSION: &str = "gen";

/// Locate the generator specification file for `srcdir`.
///
/// An explicit override wins unconditionally. Otherwise the single
/// `*.gen` file directly under the source directory is used, by sorted
/// order when more than one is present. A missing source directory yields
/// `Ok(None)` — generation cannot be evaluated before the source is
/// checked out — while a present directory with no matching file is a
/// configuration error.
pub fn find_spec_file(
    srcdir: &Path,
    explicit: Option<&Path>,
) -> Result<Option<PathBuf>, GenerationError> {
    if let Some(path) = explicit {
        return Ok(Some(path.to_path_buf()));
    }
    if !srcdir.is_dir() {
        return Ok(None);
    }

    let mut matches: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(srcdir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == SPEC_EXTENSION) {
            matches.push(PathBuf::from(entry.file_name()));
        }
    }
    matches.sort();

    match matches.into_iter().next() {
        Some(name) => Ok(Some(name)),
        None => Err(GenerationError::SpecificationNotFound {
            srcdir: srcdir.to_path_buf(),
        }),
    }
}
