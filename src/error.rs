//! Error types for the conditional-regeneration engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by generation tasks.
///
/// Filesystem problems reading the fingerprint are deliberately absent:
/// an unreadable fingerprint is a staleness signal, not a failure.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No generator specification file found in {srcdir:?}")]
    SpecificationNotFound { srcdir: PathBuf },

    #[error("Generation failed for {node}: `{command}` exited with status {status}")]
    GenerationFailed {
        node: String,
        command: String,
        status: i32,
        output: String,
    },

    #[error("Generator tool not found: {tool:?}")]
    ToolNotFound { tool: PathBuf },

    #[error("Cannot parse generator option `{0}`")]
    UnparsableOption(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for GenerationError {
    fn from(err: config::ConfigError) -> Self {
        GenerationError::Config(err.to_string())
    }
}
