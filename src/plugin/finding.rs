//! Values produced by scanning and cleaning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One reclaimable item reported by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    /// Id of the plugin that reported this item.
    pub plugin_id: String,
    /// Filesystem path (or logical resource identifier).
    pub path: PathBuf,
    /// Size in bytes, best-effort.
    pub size: u64,
    /// Why this item can be removed.
    pub reason: String,
    /// Whether removing this item needs root.
    pub requires_privilege: bool,
}

impl Finding {
    pub fn new(plugin_id: &str, path: impl Into<PathBuf>, size: u64, reason: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            path: path.into(),
            size,
            reason: reason.into(),
            requires_privilege: false,
        }
    }

    pub fn privileged(mut self, requires_privilege: bool) -> Self {
        self.requires_privilege = requires_privilege;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A plugin that failed or timed out during scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginError {
    pub plugin_id: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin_id: &str, message: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.plugin_id, self.message)
    }
}

/// Per-plugin scan outcome. A failed plugin contributes no findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScanResult {
    Findings { findings: Vec<Finding> },
    Failed { error: PluginError },
}

impl ScanResult {
    pub fn findings(&self) -> &[Finding] {
        match self {
            ScanResult::Findings { findings } => findings,
            ScanResult::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&PluginError> {
        match self {
            ScanResult::Failed { error } => Some(error),
            ScanResult::Findings { .. } => None,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.findings().iter().map(|f| f.size).sum()
    }
}

/// Why a single item could not be cleaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PermissionDenied,
    NotFound,
    IoError,
    Cancelled,
}

impl FailureKind {
    pub fn from_io(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
            std::io::ErrorKind::NotFound => FailureKind::NotFound,
            _ => FailureKind::IoError,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::PermissionDenied => "permission denied",
            FailureKind::NotFound => "not found",
            FailureKind::IoError => "I/O error",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Result of cleaning one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CleanOutcome {
    Success {
        finding: Finding,
        freed_bytes: u64,
    },
    Failure {
        finding: Finding,
        kind: FailureKind,
        message: String,
    },
}

impl CleanOutcome {
    /// The finding was removed; it frees its reported size.
    pub fn success(finding: &Finding) -> Self {
        CleanOutcome::Success {
            finding: finding.clone(),
            freed_bytes: finding.size,
        }
    }

    pub fn failure(finding: &Finding, kind: FailureKind, message: impl Into<String>) -> Self {
        CleanOutcome::Failure {
            finding: finding.clone(),
            kind,
            message: message.into(),
        }
    }

    pub fn finding(&self) -> &Finding {
        match self {
            CleanOutcome::Success { finding, .. } | CleanOutcome::Failure { finding, .. } => {
                finding
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CleanOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CleanOutcome::Failure { kind, .. } => Some(*kind),
            CleanOutcome::Success { .. } => None,
        }
    }

    /// Error text of a failed outcome.
    pub fn message(&self) -> Option<&str> {
        match self {
            CleanOutcome::Failure { message, .. } => Some(message),
            CleanOutcome::Success { .. } => None,
        }
    }

    pub fn freed_bytes(&self) -> u64 {
        match self {
            CleanOutcome::Success { freed_bytes, .. } => *freed_bytes,
            CleanOutcome::Failure { .. } => 0,
        }
    }
}

/// Aggregate of one clean request, in the caller's selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanResult {
    pub outcomes: Vec<CleanOutcome>,
    pub total_freed: u64,
}

impl CleanResult {
    pub fn from_outcomes(outcomes: Vec<CleanOutcome>) -> Self {
        let total_freed = outcomes.iter().map(CleanOutcome::freed_bytes).sum();
        Self {
            outcomes,
            total_freed,
        }
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CleanOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}
