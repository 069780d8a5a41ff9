//! User trash plugin.

use std::path::PathBuf;

use crate::plugin::descriptor::{Category, PluginDescriptor, RiskLevel};
use crate::plugin::finding::Finding;
use crate::plugin::fsops;
use crate::plugin::{Plugin, PluginFailure, ScanContext};

/// Empties the freedesktop trash (`$XDG_DATA_HOME/Trash`).
///
/// Both `files/` and their `info/` records are reported, so cleaning leaves
/// no orphaned metadata behind.
pub struct TrashPlugin {
    descriptor: PluginDescriptor,
    trash_dir: PathBuf,
}

impl TrashPlugin {
    pub fn new() -> Self {
        let trash_dir = dirs::data_dir()
            .unwrap_or_else(|| fsops::expand_home("~/.local/share"))
            .join("Trash");
        Self::with_dir(trash_dir)
    }

    pub fn with_dir(trash_dir: PathBuf) -> Self {
        Self {
            descriptor: PluginDescriptor::new("trash", "Trash", Category::Trash, RiskLevel::Safe)
                .with_description(
                    "Permanently deletes files in the trash. These files were already deleted by the user.",
                ),
            trash_dir,
        }
    }
}

impl Default for TrashPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for TrashPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn unavailable_reason(&self) -> Option<String> {
        if self.trash_dir.is_dir() {
            None
        } else {
            Some("Trash directory not found".to_string())
        }
    }

    fn scan(&self, ctx: &ScanContext) -> Result<Vec<Finding>, PluginFailure> {
        let mut findings =
            fsops::child_findings(self.id(), &self.trash_dir.join("files"), "Trash", false, ctx)?;
        findings.extend(fsops::child_findings(
            self.id(),
            &self.trash_dir.join("info"),
            "Trash info",
            false,
            ctx,
        )?);
        Ok(findings)
    }
}
