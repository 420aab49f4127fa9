//! Resolved generator toolchain.
//!
//! Locating the interpreter and tool is the host's job; this module holds
//! the resolved paths, answers version queries, and exposes the install
//! tree's freshness signal.

use crate::error::GenerationError;
use crate::tree;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

/// Name of the version file directly under the install root.
pub const VERSION_FILE: &str = "VERSION";

/// Version string reported by the installed generator tool.
///
/// Ordering is plain string comparison, matching the generator's own gating
/// behavior. That is only correct for single-digit dot-separated components
/// (`"1.10"` compares below `"1.2"`); kept as-is for compatibility with
/// existing installations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorVersion(String);

impl GeneratorVersion {
    pub fn new(version: impl Into<String>) -> Self {
        GeneratorVersion(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this version is at least `minimum`, using the preserved
    /// string ordering.
    pub fn at_least(&self, minimum: &str) -> bool {
        self.0.as_str() >= minimum
    }
}

/// The generator tool as installed on this machine.
pub struct Toolchain {
    interpreter: PathBuf,
    tool_path: PathBuf,
    install_root: Option<PathBuf>,
    version: OnceLock<Option<GeneratorVersion>>,
}

impl Toolchain {
    /// Wrap an already-located toolchain. Fails with `ToolNotFound` when
    /// the tool path does not point at a file.
    pub fn new(
        interpreter: PathBuf,
        tool_path: PathBuf,
        install_root: Option<PathBuf>,
    ) -> Result<Self, GenerationError> {
        if !tool_path.is_file() {
            return Err(GenerationError::ToolNotFound { tool: tool_path });
        }
        Ok(Toolchain {
            interpreter,
            tool_path,
            install_root,
            version: OnceLock::new(),
        })
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    pub fn tool_path(&self) -> &Path {
        &self.tool_path
    }

    pub fn install_root(&self) -> Option<&Path> {
        self.install_root.as_deref()
    }

    /// Installed generator version, read once from the version file under
    /// the install root. `None` when the root is unknown or the file is
    /// missing or empty; version-gated flags are then omitted rather than
    /// failing the build.
    pub fn version(&self) -> Option<&GeneratorVersion> {
        self.version
            .get_or_init(|| {
                let root = self.install_root.as_ref()?;
                let text = fs::read_to_string(root.join(VERSION_FILE)).ok()?;
                let line = text.lines().next()?.trim();
                if line.is_empty() {
                    None
                } else {
                    Some(GeneratorVersion::new(line))
                }
            })
            .as_ref()
    }

    /// Newest modification time anywhere under the install root. Used to
    /// detect the tool itself being updated after the last generation.
    pub fn install_mtime(&self) -> Option<SystemTime> {
        tree::newest_mtime(self.install_root.as_deref()?)
    }
}
