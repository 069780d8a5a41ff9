//! APT package cache plugin.

use std::fs;
use std::path::{Path, PathBuf};

use crate::plugin::descriptor::{Category, PluginDescriptor, RiskLevel};
use crate::plugin::finding::Finding;
use crate::plugin::fsops;
use crate::plugin::{Plugin, PluginFailure, ScanContext};

/// Removes downloaded `.deb` archives, like `apt-get clean`.
///
/// Lock files and directory structure are left alone; only package archives
/// (complete and partial) are reported.
pub struct AptCachePlugin {
    descriptor: PluginDescriptor,
    archives: PathBuf,
}

impl AptCachePlugin {
    pub fn new() -> Self {
        Self::with_archives(PathBuf::from("/var/cache/apt/archives"))
    }

    pub fn with_archives(archives: PathBuf) -> Self {
        Self {
            descriptor: PluginDescriptor::new(
                "apt_cache",
                "APT package cache",
                Category::PackageManager,
                RiskLevel::Safe,
            )
            .with_description("Downloaded package files that are already installed.")
            .privileged(),
            archives,
        }
    }

    fn debs(&self, dir: &Path, ctx: &ScanContext) -> Result<Vec<Finding>, PluginFailure> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PluginFailure::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "deb"))
            .collect();
        paths.sort();

        let mut findings = Vec::with_capacity(paths.len());
        for path in paths {
            ctx.checkpoint()?;
            let size = match fs::metadata(&path) {
                Ok(m) => m.len(),
                Err(_) => continue,
            };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let privileged = fsops::needs_privilege(&path);
            findings.push(
                Finding::new(self.id(), path, size, format!("Package archive: {}", name))
                    .privileged(privileged),
            );
        }
        Ok(findings)
    }
}

impl Default for AptCachePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for AptCachePlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn unavailable_reason(&self) -> Option<String> {
        if self.archives.is_dir() {
            None
        } else {
            Some("APT is not installed".to_string())
        }
    }

    fn scan(&self, ctx: &ScanContext) -> Result<Vec<Finding>, PluginFailure> {
        let mut findings = self.debs(&self.archives, ctx)?;
        findings.extend(self.debs(&self.archives.join("partial"), ctx)?);
        Ok(findings)
    }
}
