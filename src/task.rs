//! Generation task.
//!
//! The build-graph node that wires the staleness decision to an actual
//! generator invocation and persists the fingerprint for the next run.

use crate::config::{BuildConfig, NodeSettings};
use crate::discovery;
use crate::error::GenerationError;
use crate::fingerprint::Fingerprint;
use crate::graph::TaskGraph;
use crate::invoker::{GeneratorInvoker, Invocation};
use crate::options::{self, OptionEntry, OptionLayer};
use crate::staleness::{self, OutputProbe, StalenessCheck};
use crate::toolchain::Toolchain;
use crate::tree::SourceTree;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Graph node name of a package providing the generator tool itself.
pub const GENERATOR_NODE: &str = "generator";

/// A build node this generation node depends on. The install marker's
/// timestamp is the authoritative "when this dependency last became
/// usable" signal.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub install_marker: PathBuf,
}

impl Dependency {
    pub fn new(name: impl Into<String>, install_marker: PathBuf) -> Self {
        Dependency {
            name: name.into(),
            install_marker,
        }
    }
}

/// A build node whose sources are produced by the generator.
///
/// The dependency set is sealed at construction; prerequisite edges derived
/// from it are declared once in [`GenerationTask::prepare`].
#[derive(Debug, Clone)]
pub struct GenerationNode {
    pub name: String,
    pub srcdir: PathBuf,
    /// Explicit specification-file override; discovery is skipped when set.
    pub spec_file: Option<PathBuf>,
    /// Downstream build-preparation stamp, made dependent on the
    /// fingerprint during `prepare`.
    pub preparation_stamp: Option<PathBuf>,
    pub settings: NodeSettings,
    dependencies: Vec<Dependency>,
}

impl GenerationNode {
    pub fn new(name: impl Into<String>, srcdir: PathBuf) -> Self {
        GenerationNode {
            name: name.into(),
            srcdir,
            spec_file: None,
            preparation_stamp: None,
            settings: NodeSettings::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_settings(mut self, settings: NodeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }
}

/// Result of one `ensure_generated` evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Source directory absent; nothing to evaluate yet.
    SourceNotPresent,
    /// Fingerprint current; the subprocess was skipped and the stamp
    /// marked current.
    UpToDate,
    /// The generator ran and the fingerprint was rewritten.
    Regenerated,
}

/// Conditional-regeneration step for one build node.
pub struct GenerationTask<'a> {
    node: GenerationNode,
    config: &'a BuildConfig,
    toolchain: &'a Toolchain,
}

impl<'a> GenerationTask<'a> {
    pub fn new(node: GenerationNode, config: &'a BuildConfig, toolchain: &'a Toolchain) -> Self {
        GenerationTask {
            node,
            config,
            toolchain,
        }
    }

    pub fn node(&self) -> &GenerationNode {
        &self.node
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::for_source_dir(&self.node.srcdir)
    }

    /// Graph node name of this node's fingerprint file.
    pub fn stamp_node(&self) -> String {
        format!("{}/genstamp", self.node.name)
    }

    fn preparation_node(&self) -> String {
        format!("{}/prepare", self.node.name)
    }

    /// Resolved specification file, relative to the source directory.
    /// `Ok(None)` when the source directory is not present yet.
    pub fn spec_file(&self) -> Result<Option<PathBuf>, GenerationError> {
        discovery::find_spec_file(&self.node.srcdir, self.node.spec_file.as_deref())
    }

    /// The argument vector a regeneration would use right now, or `None`
    /// when the source is not present.
    pub fn candidate_args(&self) -> Result<Option<Vec<String>>, GenerationError> {
        match self.spec_file()? {
            Some(spec) => Ok(Some(self.compile_args(&spec)?)),
            None => Ok(None),
        }
    }

    fn compile_args(&self, spec: &Path) -> Result<Vec<String>, GenerationError> {
        let settings = &self.node.settings;
        let mut global = Vec::new();
        let mut node = Vec::new();

        if self.config.effective_corba(settings) {
            let layer = scope_layer(settings.corba.is_some());
            let entry = OptionEntry::parse("--corba", layer)?;
            push_scoped(&mut global, &mut node, entry);
        }

        if let Some(enabled) = self.config.effective_extended_states(settings) {
            let layer = scope_layer(settings.extended_states.is_some());
            let token = if enabled {
                "--extended-states"
            } else {
                "--no-extended-states"
            };
            let entry = OptionEntry::parse(token, layer)?;
            push_scoped(&mut global, &mut node, entry);
        }

        global.push(
            OptionEntry::parse(
                &format!("--parallel-build={}", self.config.parallel_build_level),
                OptionLayer::GlobalDefault,
            )?
            .gated("1.0"),
        );
        global.push(
            OptionEntry::parse(
                &format!("--type-export-policy={}", self.config.type_export_policy),
                OptionLayer::GlobalDefault,
            )?
            .gated("1.1"),
        );
        let mut transports = self.config.transports.clone();
        transports.sort();
        transports.dedup();
        global.push(
            OptionEntry::parse(
                &format!("--transports={}", transports.join(",")),
                OptionLayer::GlobalDefault,
            )?
            .gated("1.1"),
        );

        // Raw overrides: build-wide pass first, node pass takes precedence.
        let mut raw = Vec::new();
        for token in &self.config.generator_options {
            raw.push(OptionEntry::parse(token, OptionLayer::RawOverride)?);
        }
        for token in &settings.generator_options {
            raw.push(OptionEntry::parse(token, OptionLayer::RawOverride)?);
        }

        Ok(options::compile(
            &global,
            &node,
            &raw,
            self.toolchain.version(),
            spec,
        ))
    }

    /// Evaluate freshness and regenerate if needed.
    ///
    /// When fresh, the fingerprint node is touched in the task graph and no
    /// subprocess runs. On generator failure the fingerprint is left
    /// untouched, so the next build attempt retries from the same state.
    pub fn ensure_generated(
        &self,
        graph: &dyn TaskGraph,
        probe: Option<&dyn OutputProbe>,
        invoker: &dyn GeneratorInvoker,
    ) -> Result<Outcome, GenerationError> {
        let Some(spec) = self.spec_file()? else {
            debug!(node = %self.node.name, "source not present, skipping generation");
            return Ok(Outcome::SourceNotPresent);
        };
        let args = self.compile_args(&spec)?;
        let fingerprint = self.fingerprint();

        let check = StalenessCheck {
            force: self.config.always_regenerate,
            fingerprint: &fingerprint,
            candidate_args: &args,
            probe,
            tool_install_mtime: self.toolchain.install_mtime(),
        };
        let Some(reason) = staleness::evaluate(&check) else {
            info!(node = %self.node.name, "no need to regenerate");
            graph.touch(&self.stamp_node());
            return Ok(Outcome::UpToDate);
        };

        info!(node = %self.node.name, ?reason, "regenerating");
        let invocation = Invocation {
            interpreter: self.toolchain.interpreter().to_path_buf(),
            tool_path: self.toolchain.tool_path().to_path_buf(),
            args: args.clone(),
            workdir: self.node.srcdir.clone(),
        };
        let result = invoker.invoke(&invocation).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GenerationError::ToolNotFound {
                tool: invocation.interpreter.clone(),
            },
            _ => GenerationError::Io(e),
        })?;
        if !result.success() {
            return Err(GenerationError::GenerationFailed {
                node: self.node.name.clone(),
                command: invocation.command_line(),
                status: result.status,
                output: result.output,
            });
        }

        fingerprint.write(&args)?;
        info!(node = %self.node.name, "generated sources refreshed");
        Ok(Outcome::Regenerated)
    }

    /// One-time build-graph wiring for this node.
    ///
    /// The fingerprint node depends on the full source tree and on every
    /// dependency's install marker; the downstream preparation stamp
    /// depends on the fingerprint. The generator itself is tracked through
    /// its providing node when one is registered, otherwise through its
    /// installation tree (best effort).
    pub fn prepare(&self, graph: &dyn TaskGraph) -> Result<(), GenerationError> {
        let stamp = self.stamp_node();
        graph.register_file(&stamp, self.fingerprint().path());

        if self.node.srcdir.is_dir() {
            let tree = SourceTree::new(self.node.srcdir.clone());
            graph.add_path_prerequisites(&stamp, &tree.files()?);
        }

        for dependency in self.node.dependencies() {
            graph.register_file(&dependency.name, &dependency.install_marker);
            graph.add_dependency(&stamp, &dependency.name);
        }

        let runtime = format!(
            "runtime-{}",
            self.config.resolved_target(&self.node.settings)
        );
        if graph.contains(&runtime) {
            debug!(node = %self.node.name, runtime = %runtime, "found runtime provider");
            graph.add_dependency(&stamp, &runtime);
        }

        if graph.contains(GENERATOR_NODE) {
            graph.add_dependency(&stamp, GENERATOR_NODE);
        } else if let Some(root) = self.toolchain.install_root() {
            graph.add_path_prerequisites(&stamp, &[root.to_path_buf()]);
        }

        if let Some(preparation_stamp) = &self.node.preparation_stamp {
            let preparation = self.preparation_node();
            graph.register_file(&preparation, preparation_stamp);
            graph.add_dependency(&preparation, &stamp);
        }

        Ok(())
    }

    /// Drop the fingerprint so the next evaluation regenerates
    /// unconditionally.
    pub fn prepare_for_forced_build(&self) -> Result<(), GenerationError> {
        self.fingerprint().remove()
    }
}

fn scope_layer(node_scoped: bool) -> OptionLayer {
    if node_scoped {
        OptionLayer::NodeOverride
    } else {
        OptionLayer::GlobalDefault
    }
}

fn push_scoped(global: &mut Vec<OptionEntry>, node: &mut Vec<OptionEntry>, entry: OptionEntry) {
    if entry.layer() == OptionLayer::NodeOverride {
        node.push(entry);
    } else {
        global.push(entry);
    }
}
