//! Core trait implemented by every cleaning module.

use std::path::PathBuf;
use thiserror::Error;

use super::context::{CleanContext, ScanContext};
use super::descriptor::PluginDescriptor;
use super::finding::{CleanOutcome, FailureKind, Finding};
use super::fsops;

/// Error a plugin returns from its scan phase.
#[derive(Error, Debug)]
pub enum PluginFailure {
    #[error("cancelled")]
    Cancelled,

    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Trait for cleaning modules.
///
/// Implement this trait to add a new kind of reclaimable data. A plugin:
/// - Describes itself through an immutable [`PluginDescriptor`]
/// - Reports reclaimable items during `scan`, without deleting anything
/// - Removes a previously reported subset during `clean`
pub trait Plugin: Send + Sync {
    fn descriptor(&self) -> &PluginDescriptor;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Why this plugin cannot work on this system, or `None` if it can.
    fn unavailable_reason(&self) -> Option<String> {
        None
    }

    /// Find reclaimable items. Must not modify the filesystem.
    ///
    /// Long walks should call [`ScanContext::checkpoint`] regularly.
    fn scan(&self, ctx: &ScanContext) -> Result<Vec<Finding>, PluginFailure>;

    /// Remove the given findings, returning one outcome per finding in the
    /// same order.
    ///
    /// The default removes each path, isolating per-item failures.
    fn clean(&self, findings: &[Finding], ctx: &CleanContext) -> Vec<CleanOutcome> {
        findings
            .iter()
            .map(|finding| {
                if ctx.is_cancelled() {
                    CleanOutcome::failure(finding, FailureKind::Cancelled, "cancelled")
                } else {
                    fsops::remove_finding(finding)
                }
            })
            .collect()
    }
}
