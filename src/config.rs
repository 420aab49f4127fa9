//! Build-run configuration.
//!
//! All process-wide policy (force-regeneration, default transports, type
//! export policy, toggles) lives in an immutable [`BuildConfig`] constructed
//! once when the build run starts and passed by reference into every node's
//! generation task. Nothing here is read from ambient global state after
//! construction.

use crate::error::GenerationError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Target used when neither the node nor the build run picked one.
pub const DEFAULT_TARGET: &str = "gnulinux";

/// How the generator exports types to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeExportPolicy {
    Used,
    All,
}

impl TypeExportPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeExportPolicy::Used => "used",
            TypeExportPolicy::All => "all",
        }
    }
}

impl fmt::Display for TypeExportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build-wide generation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Generate CORBA transport support.
    #[serde(default)]
    pub corba: bool,

    /// Extended-state support. `None` leaves the generator's own default;
    /// `Some(false)` emits the explicit negative flag.
    #[serde(default)]
    pub extended_states: Option<bool>,

    /// Enabled transports. Deduplicated and sorted when compiled into the
    /// argument vector.
    #[serde(default = "default_transports")]
    pub transports: Vec<String>,

    /// Type export policy passed to the generator.
    #[serde(default = "default_type_export_policy")]
    pub type_export_policy: TypeExportPolicy,

    /// Parallelism level for the generator's own build steps.
    #[serde(default = "default_parallel_build_level")]
    pub parallel_build_level: usize,

    /// Regenerate on every evaluation instead of checking freshness.
    #[serde(default = "default_true")]
    pub always_regenerate: bool,

    /// Default generation target; nodes may override it.
    #[serde(default)]
    pub target: Option<String>,

    /// Raw generator options applied after the policy-decided ones.
    #[serde(default)]
    pub generator_options: Vec<String>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_transports() -> Vec<String> {
    vec![
        "corba".to_string(),
        "typelib".to_string(),
        "mqueue".to_string(),
    ]
}

fn default_type_export_policy() -> TypeExportPolicy {
    TypeExportPolicy::Used
}

fn default_parallel_build_level() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            corba: false,
            extended_states: None,
            transports: default_transports(),
            type_export_policy: default_type_export_policy(),
            parallel_build_level: default_parallel_build_level(),
            always_regenerate: default_true(),
            target: None,
            generator_options: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from an optional file plus `REGEN_*` environment
    /// overrides (nested keys use `__`, e.g. `REGEN_LOGGING__LEVEL`).
    pub fn load(path: Option<&Path>) -> Result<Self, GenerationError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("REGEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let cfg: BuildConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, GenerationError> {
        let cfg: BuildConfig =
            toml::from_str(text).map_err(|e| GenerationError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.parallel_build_level == 0 {
            return Err(GenerationError::Config(
                "parallel_build_level must be at least 1".to_string(),
            ));
        }
        for transport in &self.transports {
            if transport.is_empty() {
                return Err(GenerationError::Config(
                    "transports cannot contain empty entries".to_string(),
                ));
            }
            if transport.contains(',') || transport.chars().any(char::is_whitespace) {
                return Err(GenerationError::Config(format!(
                    "invalid transport name `{}`",
                    transport
                )));
            }
        }
        if let Some(target) = &self.target {
            if target.is_empty() {
                return Err(GenerationError::Config(
                    "target cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Generation target for a node: node override, then build default,
    /// then [`DEFAULT_TARGET`].
    pub fn resolved_target(&self, settings: &NodeSettings) -> String {
        settings
            .target
            .clone()
            .or_else(|| self.target.clone())
            .unwrap_or_else(|| DEFAULT_TARGET.to_string())
    }

    /// Effective CORBA toggle for a node (node override wins).
    pub fn effective_corba(&self, settings: &NodeSettings) -> bool {
        settings.corba.unwrap_or(self.corba)
    }

    /// Effective extended-states setting for a node (node override wins;
    /// `None` means neither scope set it).
    pub fn effective_extended_states(&self, settings: &NodeSettings) -> Option<bool> {
        settings.extended_states.or(self.extended_states)
    }
}

/// Per-node overrides layered over the build-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSettings {
    #[serde(default)]
    pub corba: Option<bool>,

    #[serde(default)]
    pub extended_states: Option<bool>,

    #[serde(default)]
    pub target: Option<String>,

    /// Raw generator options for this node; applied after the build-wide
    /// raw options and override them.
    #[serde(default)]
    pub generator_options: Vec<String>,
}
