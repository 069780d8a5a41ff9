//! Archived systemd journal plugin.

use std::path::PathBuf;

use walkdir::WalkDir;

use crate::plugin::descriptor::{Category, PluginDescriptor, RiskLevel};
use crate::plugin::finding::Finding;
use crate::plugin::fsops;
use crate::plugin::{Plugin, PluginFailure, ScanContext};

/// Removes rotated journal files.
///
/// Active journals (`system.journal`, `user-1000.journal`) are never
/// reported; only archived (`name@seqnum.journal`) and dirty
/// (`*.journal~`) files are.
pub struct JournalLogsPlugin {
    descriptor: PluginDescriptor,
    journal_dir: PathBuf,
}

impl JournalLogsPlugin {
    pub fn new() -> Self {
        Self::with_dir(PathBuf::from("/var/log/journal"))
    }

    pub fn with_dir(journal_dir: PathBuf) -> Self {
        Self {
            descriptor: PluginDescriptor::new(
                "journal_logs",
                "Archived journal logs",
                Category::System,
                RiskLevel::Dangerous,
            )
            .with_description("Rotated systemd journal files. Old logs are lost for good.")
            .privileged(),
            journal_dir,
        }
    }

    fn is_archived(name: &str) -> bool {
        name.ends_with(".journal~") || (name.ends_with(".journal") && name.contains('@'))
    }
}

impl Default for JournalLogsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for JournalLogsPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn unavailable_reason(&self) -> Option<String> {
        if self.journal_dir.is_dir() {
            None
        } else {
            Some("No persistent journal".to_string())
        }
    }

    fn scan(&self, ctx: &ScanContext) -> Result<Vec<Finding>, PluginFailure> {
        let mut findings = Vec::new();

        let walker = WalkDir::new(&self.journal_dir)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter();

        for entry in walker.flatten() {
            ctx.checkpoint()?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !Self::is_archived(&name) {
                continue;
            }
            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(_) => continue,
            };
            let reason = format!("Archived journal: {}", name);
            let path = entry.path();
            findings.push(
                Finding::new(self.id(), path, size, reason).privileged(fsops::needs_privilege(path)),
            );
        }

        Ok(findings)
    }
}
