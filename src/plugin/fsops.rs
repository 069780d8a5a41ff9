//! Filesystem helpers shared by plugins.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::context::ScanContext;
use super::finding::{CleanOutcome, FailureKind, Finding};
use super::plugin::PluginFailure;

/// Total apparent size of all files below `path`.
///
/// Unreadable entries are skipped; a plain file returns its own length.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Size of a single entry without following symlinks.
pub fn entry_size(path: &Path) -> io::Result<u64> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        Ok(dir_size(path))
    } else {
        Ok(meta.len())
    }
}

/// Remove a file, symlink or directory tree.
///
/// Already-absent paths fail with `NotFound`, which makes retries harmless.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Whether `path` is acceptable as a deletion target: absolute and at least
/// two components below the root.
pub fn is_safe_target(path: &Path) -> bool {
    path.is_absolute() && path.components().count() > 2
}

/// Remove the path of `finding` and convert the result into an outcome.
pub fn remove_finding(finding: &Finding) -> CleanOutcome {
    if !is_safe_target(&finding.path) {
        tracing::warn!("Refusing to remove {}", finding.path.display());
        return CleanOutcome::failure(finding, FailureKind::IoError, "refusing to remove unsafe path");
    }
    match remove_path(&finding.path) {
        Ok(()) => {
            tracing::debug!("Removed {}", finding.path.display());
            CleanOutcome::success(finding)
        }
        Err(e) => {
            tracing::debug!("Failed to remove {}: {}", finding.path.display(), e);
            CleanOutcome::failure(finding, FailureKind::from_io(e.kind()), e.to_string())
        }
    }
}

/// Report every non-empty direct child of `dir` as one finding.
///
/// A missing directory yields no findings. Children are visited in name
/// order and the cancellation checkpoint is polled between them. When
/// `privileged` is set, each finding is flagged only if the current user
/// cannot remove it.
pub fn child_findings(
    plugin_id: &str,
    dir: &Path,
    label: &str,
    privileged: bool,
    ctx: &ScanContext,
) -> Result<Vec<Finding>, PluginFailure> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let read = fs::read_dir(dir).map_err(|source| PluginFailure::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut children: Vec<PathBuf> = read.flatten().map(|e| e.path()).collect();
    children.sort();

    let mut findings = Vec::new();
    for child in children {
        ctx.checkpoint()?;
        match entry_size(&child) {
            Ok(0) => {}
            Ok(size) => {
                let name = child
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let requires_privilege = privileged && needs_privilege(&child);
                findings.push(
                    Finding::new(plugin_id, child, size, format!("{}: {}", label, name))
                        .privileged(requires_privilege),
                );
            }
            Err(e) => tracing::debug!("Cannot access {}: {}", child.display(), e),
        }
    }

    Ok(findings)
}

/// Report `dir` itself as one finding if it holds any data.
pub fn whole_dir_finding(
    plugin_id: &str,
    dir: &Path,
    reason: &str,
    privileged: bool,
    ctx: &ScanContext,
) -> Result<Option<Finding>, PluginFailure> {
    ctx.checkpoint()?;
    if !dir.exists() {
        return Ok(None);
    }
    let size = entry_size(dir).map_err(|source| PluginFailure::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    if size == 0 {
        return Ok(None);
    }
    let requires_privilege = privileged && needs_privilege(dir);
    Ok(Some(
        Finding::new(plugin_id, dir, size, reason).privileged(requires_privilege),
    ))
}

/// Whether removing `path` needs root: true when its parent directory is not
/// writable by the current user.
pub fn needs_privilege(path: &Path) -> bool {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return false,
    };
    nix::unistd::access(parent, nix::unistd::AccessFlags::W_OK).is_err()
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}
