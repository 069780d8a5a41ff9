//! Generic plugin that reclaims a fixed set of directories.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::context::ScanContext;
use super::descriptor::PluginDescriptor;
use super::finding::Finding;
use super::fsops;
use super::plugin::{Plugin, PluginFailure};

/// How a directory is turned into findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Each direct child of the directory is one finding.
    #[default]
    Contents,
    /// The directory itself is one finding.
    Whole,
}

/// Plugin backed by a list of directories.
///
/// Used by several built-ins and by every drop-in manifest.
#[derive(Debug)]
pub struct DirectoryPlugin {
    descriptor: PluginDescriptor,
    dirs: Vec<PathBuf>,
    mode: ScanMode,
}

impl DirectoryPlugin {
    pub fn new(descriptor: PluginDescriptor, dirs: Vec<PathBuf>, mode: ScanMode) -> Self {
        Self {
            descriptor,
            dirs,
            mode,
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }
}

impl Plugin for DirectoryPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn unavailable_reason(&self) -> Option<String> {
        if self.dirs.iter().any(|d| d.is_dir()) {
            None
        } else {
            Some(format!("{} not found", self.descriptor.name))
        }
    }

    fn scan(&self, ctx: &ScanContext) -> Result<Vec<Finding>, PluginFailure> {
        let id = &self.descriptor.id;
        let privileged = self.descriptor.requires_privilege;
        let mut findings = Vec::new();

        for dir in &self.dirs {
            match self.mode {
                ScanMode::Contents => {
                    findings.extend(fsops::child_findings(
                        id,
                        dir,
                        &self.descriptor.name,
                        privileged,
                        ctx,
                    )?);
                }
                ScanMode::Whole => {
                    let reason = if self.descriptor.description.is_empty() {
                        self.descriptor.name.as_str()
                    } else {
                        self.descriptor.description.as_str()
                    };
                    if let Some(f) = fsops::whole_dir_finding(id, dir, reason, privileged, ctx)? {
                        findings.push(f);
                    }
                }
            }
        }

        Ok(findings)
    }
}
