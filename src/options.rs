//! Option compilation for generator invocations.
//!
//! Merges layered, possibly conflicting option sources into one
//! deterministic argument vector. Each option is a tagged entry carrying
//! the flag identifier used for override matching, so conflicting prior
//! entries are removed by identifier in a plain fold rather than by
//! pattern-matching arbitrary strings.

use crate::error::GenerationError;
use crate::toolchain::GeneratorVersion;
use std::path::Path;

/// Source layer an option entry came from; doubles as its precedence rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionLayer {
    GlobalDefault,
    NodeOverride,
    RawOverride,
}

/// A single generator flag or `flag=value` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    flag: String,
    token: String,
    negation: bool,
    layer: OptionLayer,
    min_version: Option<String>,
}

impl OptionEntry {
    /// Parse a raw token into a tagged entry. The flag identifier is the
    /// leading identifier run after any dashes, with a `no-` prefix marking
    /// negation; `--extended-states` and `--no-extended-states` share the
    /// identifier `extended-states`.
    pub fn parse(token: &str, layer: OptionLayer) -> Result<Self, GenerationError> {
        let stripped = token.trim_start_matches('-');
        let (negation, name) = match stripped.strip_prefix("no-") {
            Some(rest) => (true, rest),
            None => (false, stripped),
        };
        let flag: String = name
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if flag.is_empty() {
            return Err(GenerationError::UnparsableOption(token.to_string()));
        }
        Ok(OptionEntry {
            flag,
            token: token.to_string(),
            negation,
            layer,
            min_version: None,
        })
    }

    /// Gate this entry on a minimum generator version; it is omitted when
    /// the installed version is older or unresolved.
    pub fn gated(mut self, min_version: &str) -> Self {
        self.min_version = Some(min_version.to_string());
        self
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_negation(&self) -> bool {
        self.negation
    }

    pub fn layer(&self) -> OptionLayer {
        self.layer
    }

    fn supported_by(&self, version: Option<&GeneratorVersion>) -> bool {
        match &self.min_version {
            None => true,
            Some(min) => version.map_or(false, |v| v.at_least(min)),
        }
    }
}

/// Compile layered option sources into the final argument vector.
///
/// Entries are folded in precedence order (global policy, node policy, then
/// raw overrides); each entry removes conflicting prior entries — same flag
/// identifier, either spelling — before being appended. Version-gated
/// entries the installed generator does not support are omitted. The
/// surviving tokens are sorted lexicographically and the specification-file
/// path is appended last as a positional argument.
pub fn compile(
    global: &[OptionEntry],
    node: &[OptionEntry],
    raw_overrides: &[OptionEntry],
    capabilities: Option<&GeneratorVersion>,
    spec_file: &Path,
) -> Vec<String> {
    let mut merged: Vec<OptionEntry> = Vec::new();
    for entry in global.iter().chain(node).chain(raw_overrides) {
        if !entry.supported_by(capabilities) {
            continue;
        }
        apply(&mut merged, entry.clone());
    }

    let mut args: Vec<String> = merged.into_iter().map(|entry| entry.token).collect();
    args.sort();
    args.push(spec_file.display().to_string());
    args
}

/// Fold one entry into the accumulated set.
fn apply(merged: &mut Vec<OptionEntry>, entry: OptionEntry) {
    merged.retain(|existing| existing.flag != entry.flag);
    merged.push(entry);
}
