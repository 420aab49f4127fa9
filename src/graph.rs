//! Task-graph seam.
//!
//! The narrow interface this subsystem requires from the host build-graph
//! engine: file-backed nodes, prerequisite edges, mtime queries, node
//! actions, and a touch primitive. The trait owns no decision logic —
//! [`MemoryGraph`] implements it over real file mtimes and stands in for
//! the host engine in tests and embeddings without one.

use crate::error::GenerationError;
use crate::tree;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// Action attached to a node, run by the host when the node is out of date.
pub type NodeAction = Arc<dyn Fn() -> Result<(), GenerationError> + Send + Sync>;

/// Minimal contract required from the host build-graph engine.
pub trait TaskGraph {
    /// Register a file-backed node under `name`.
    fn register_file(&self, name: &str, path: &Path);

    /// Declare that `node` cannot be current unless `prerequisite` is.
    fn add_dependency(&self, node: &str, prerequisite: &str);

    /// Declare that `node` depends on a set of filesystem paths. Directory
    /// paths are compared by the newest mtime in their tree.
    fn add_path_prerequisites(&self, node: &str, paths: &[PathBuf]);

    /// Last-known modification time of a node's backing file.
    fn mtime(&self, name: &str) -> Option<SystemTime>;

    /// Attach the action executed when the node is out of date.
    fn set_action(&self, name: &str, action: NodeAction);

    /// Mark a node current without re-running its action.
    fn touch(&self, name: &str);

    /// Whether a node with this name is registered.
    fn contains(&self, name: &str) -> bool;
}

#[derive(Default)]
struct NodeState {
    path: PathBuf,
    prerequisites: Vec<String>,
    path_prerequisites: Vec<PathBuf>,
    action: Option<NodeAction>,
}

/// In-memory task graph backed by real file mtimes.
#[derive(Default)]
pub struct MemoryGraph {
    nodes: RwLock<HashMap<String, NodeState>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is out of date: its backing file is missing, or any
    /// prerequisite (node or path) is missing or newer.
    pub fn dirty(&self, name: &str) -> bool {
        let nodes = self.nodes.read();
        let Some(node) = nodes.get(name) else {
            return false;
        };
        let Some(own_mtime) = path_mtime(&node.path) else {
            return true;
        };

        for prerequisite in &node.prerequisites {
            let Some(state) = nodes.get(prerequisite) else {
                continue;
            };
            match path_mtime(&state.path) {
                None => return true,
                Some(mtime) if mtime > own_mtime => return true,
                Some(_) => {}
            }
        }
        for path in &node.path_prerequisites {
            match path_mtime(path) {
                None => return true,
                Some(mtime) if mtime > own_mtime => return true,
                Some(_) => {}
            }
        }
        false
    }

    /// Run `name`'s action if the node is out of date. Returns whether the
    /// action ran.
    pub fn build(&self, name: &str) -> Result<bool, GenerationError> {
        if !self.dirty(name) {
            return Ok(false);
        }
        let action = self.nodes.read().get(name).and_then(|n| n.action.clone());
        match action {
            Some(action) => {
                action()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Prerequisite node names, for inspection.
    pub fn prerequisites(&self, name: &str) -> Vec<String> {
        self.nodes
            .read()
            .get(name)
            .map(|n| n.prerequisites.clone())
            .unwrap_or_default()
    }

    /// Prerequisite paths, for inspection.
    pub fn path_prerequisites(&self, name: &str) -> Vec<PathBuf> {
        self.nodes
            .read()
            .get(name)
            .map(|n| n.path_prerequisites.clone())
            .unwrap_or_default()
    }
}

impl TaskGraph for MemoryGraph {
    fn register_file(&self, name: &str, path: &Path) {
        let mut nodes = self.nodes.write();
        let node = nodes.entry(name.to_string()).or_default();
        node.path = path.to_path_buf();
    }

    fn add_dependency(&self, node: &str, prerequisite: &str) {
        let mut nodes = self.nodes.write();
        let state = nodes.entry(node.to_string()).or_default();
        let prerequisite = prerequisite.to_string();
        if !state.prerequisites.contains(&prerequisite) {
            state.prerequisites.push(prerequisite);
        }
    }

    fn add_path_prerequisites(&self, node: &str, paths: &[PathBuf]) {
        let mut nodes = self.nodes.write();
        let state = nodes.entry(node.to_string()).or_default();
        for path in paths {
            if !state.path_prerequisites.contains(path) {
                state.path_prerequisites.push(path.clone());
            }
        }
    }

    fn mtime(&self, name: &str) -> Option<SystemTime> {
        let nodes = self.nodes.read();
        path_mtime(&nodes.get(name)?.path)
    }

    fn set_action(&self, name: &str, action: NodeAction) {
        let mut nodes = self.nodes.write();
        nodes.entry(name.to_string()).or_default().action = Some(action);
    }

    fn touch(&self, name: &str) {
        let path = {
            let nodes = self.nodes.read();
            match nodes.get(name) {
                Some(node) => node.path.clone(),
                None => return,
            }
        };
        if let Err(e) = touch_file(&path) {
            warn!(node = name, path = %path.display(), error = %e, "failed to touch node");
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.nodes.read().contains_key(name)
    }
}

fn path_mtime(path: &Path) -> Option<SystemTime> {
    let metadata = fs::metadata(path).ok()?;
    if metadata.is_dir() {
        tree::newest_mtime(path)
    } else {
        metadata.modified().ok()
    }
}

fn touch_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.set_modified(SystemTime::now())
}
