//! Logging System
//!
//! Structured logging via the `tracing` crate. Level, format and output
//! destination come from [`LoggingConfig`], with `REGEN_LOG`,
//! `REGEN_LOG_FORMAT` and `REGEN_LOG_OUTPUT` environment overrides.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path (when output is "file")
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Colored output (text format on a terminal destination)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(".regen/regen.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Initialize the logging system.
///
/// Priority order (highest to lowest): environment variables, the supplied
/// configuration, built-in defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), GenerationError> {
    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let (writer, is_file) = determine_writer(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true) && !is_file;

    let base_subscriber = Registry::default().with(filter);
    if format == "json" {
        base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .init();
    } else {
        base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(writer),
            )
            .init();
    }

    Ok(())
}

/// Build environment filter from config or the `REGEN_LOG` variable
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, GenerationError> {
    if let Ok(filter) = EnvFilter::try_from_env("REGEN_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{}={}", module, module_level);
            filter = filter.add_directive(directive.parse().map_err(|e| {
                GenerationError::Config(format!("Invalid log directive: {}", e))
            })?);
        }
    }

    Ok(filter)
}

/// Determine output format from config or environment
fn determine_format(config: Option<&LoggingConfig>) -> Result<String, GenerationError> {
    if let Ok(format) = std::env::var("REGEN_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(GenerationError::Config(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }

    Ok(format.to_string())
}

/// Resolve the output destination to a writer; the bool reports whether it
/// is a file (which disables ANSI color).
fn determine_writer(
    config: Option<&LoggingConfig>,
) -> Result<(BoxMakeWriter, bool), GenerationError> {
    let output = std::env::var("REGEN_LOG_OUTPUT")
        .unwrap_or_else(|_| config.map(|c| c.output.clone()).unwrap_or_else(default_output));

    match output.as_str() {
        "stdout" => Ok((BoxMakeWriter::new(std::io::stdout), false)),
        "stderr" => Ok((BoxMakeWriter::new(std::io::stderr), false)),
        "file" => {
            let log_file = config
                .map(|c| c.file.clone())
                .unwrap_or_else(default_log_file);
            if let Some(parent) = log_file.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GenerationError::Config(format!("Failed to create log directory: {}", e))
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .map_err(|e| {
                    GenerationError::Config(format!(
                        "Failed to open log file {:?}: {}",
                        log_file, e
                    ))
                })?;
            Ok((BoxMakeWriter::new(Arc::new(file)), true))
        }
        other => Err(GenerationError::Config(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr', or 'file')",
            other
        ))),
    }
}
