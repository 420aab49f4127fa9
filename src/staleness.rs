//! Staleness evaluation for generation nodes.
//!
//! Regeneration is expensive (minutes on non-trivial specifications), so
//! the decision runs four independent signals as a short-circuiting OR,
//! cheapest first. A dependency becoming newer than the fingerprint is not
//! re-derived here; it is expressed as prerequisite edges on the
//! fingerprint node, so the host engine re-invokes this check whenever a
//! dependency or source file changes.

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use std::time::SystemTime;
use tracing::debug;

/// Downstream build step's view of whether the generated output on disk is
/// already consistent. Implementations report `true` when there is nothing
/// to check yet (no established build directory or build file).
pub trait OutputProbe {
    fn is_output_current(&self) -> bool;
}

/// Why a node must regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessReason {
    /// The build run is configured to always regenerate.
    ForcePolicy,
    /// No readable fingerprint, or its argument vector differs from the
    /// candidate.
    FingerprintMismatch,
    /// The downstream build step reports its output out of date.
    OutputOutdated,
    /// The generator installation is newer than the fingerprint.
    ToolUpdated,
}

/// Inputs to one staleness evaluation.
pub struct StalenessCheck<'a> {
    pub force: bool,
    pub fingerprint: &'a Fingerprint,
    pub candidate_args: &'a [String],
    pub probe: Option<&'a dyn OutputProbe>,
    pub tool_install_mtime: Option<SystemTime>,
}

/// Evaluate the staleness signals in order; `None` means fresh.
pub fn evaluate(check: &StalenessCheck<'_>) -> Option<StalenessReason> {
    if check.force {
        return Some(StalenessReason::ForcePolicy);
    }

    // An unreadable fingerprint lands here too: regenerating is always
    // safer than building against stale generated code.
    if !check.fingerprint.matches(check.candidate_args) {
        return Some(StalenessReason::FingerprintMismatch);
    }

    if let Some(probe) = check.probe {
        if !probe.is_output_current() {
            return Some(StalenessReason::OutputOutdated);
        }
    }

    if let (Some(tool), Some(stamp)) = (check.tool_install_mtime, check.fingerprint.mtime()) {
        if tool > stamp {
            debug!(
                tool = %DateTime::<Utc>::from(tool).to_rfc3339(),
                fingerprint = %DateTime::<Utc>::from(stamp).to_rfc3339(),
                "generator installation newer than fingerprint"
            );
            return Some(StalenessReason::ToolUpdated);
        }
    }

    None
}

/// Whether regeneration must run.
pub fn needs_regeneration(check: &StalenessCheck<'_>) -> bool {
    evaluate(check).is_some()
}
