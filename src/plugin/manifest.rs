//! Drop-in plugin manifests.
//!
//! A drop-in directory holds `*.toml` files, each describing one
//! directory-based plugin:
//!
//! ```toml
//! id = "gimp_cache"
//! name = "GIMP cache"
//! description = "Thumbnails and swap files left by GIMP"
//! category = "other"
//! risk = "safe"
//! requires_privilege = false
//! mode = "contents"
//! paths = ["~/.cache/gimp"]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::descriptor::{Category, PluginDescriptor, RiskLevel};
use super::directory::{DirectoryPlugin, ScanMode};
use super::fsops::expand_home;
use super::plugin::Plugin;
use crate::error::RegistryValidationError;

/// Raw manifest as written on disk. Enum-valued fields stay strings so that
/// unknown values surface as validation errors instead of parse errors.
#[derive(Debug, Deserialize)]
struct RawManifest {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default = "default_risk")]
    risk: String,
    #[serde(default)]
    requires_privilege: bool,
    #[serde(default)]
    mode: ScanMode,
    #[serde(default)]
    paths: Vec<String>,
}

fn default_category() -> String {
    "other".to_string()
}

fn default_risk() -> String {
    "safe".to_string()
}

/// Parse one manifest into a plugin.
pub fn parse_manifest(content: &str, path: &Path) -> Result<DirectoryPlugin, RegistryValidationError> {
    let raw: RawManifest = toml::from_str(content).map_err(|e| RegistryValidationError::Manifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let risk: RiskLevel = raw
        .risk
        .parse()
        .map_err(|_| RegistryValidationError::UnknownRisk {
            id: raw.id.clone(),
            value: raw.risk.clone(),
        })?;
    let category: Category =
        raw.category
            .parse()
            .map_err(|_| RegistryValidationError::UnknownCategory {
                id: raw.id.clone(),
                value: raw.category.clone(),
            })?;

    if raw.paths.is_empty() {
        return Err(RegistryValidationError::NoPaths(raw.id));
    }

    let mut descriptor = PluginDescriptor::new(&raw.id, &raw.name, category, risk)
        .with_description(&raw.description);
    descriptor.requires_privilege = raw.requires_privilege;

    let dirs = raw.paths.iter().map(|p| expand_home(p)).collect();
    Ok(DirectoryPlugin::new(descriptor, dirs, raw.mode))
}

/// Load every manifest in `dir`, in file name order.
///
/// Returns loaded plugins and the manifests that were rejected. A missing
/// directory is not an error.
pub fn load_dir(dir: &Path) -> (Vec<Arc<dyn Plugin>>, Vec<RegistryValidationError>) {
    let mut plugins: Vec<Arc<dyn Plugin>> = Vec::new();
    let mut rejected = Vec::new();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Skipping plugin directory {}: {}", dir.display(), e);
            return (plugins, rejected);
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();

    for file in files {
        let result = fs::read_to_string(&file)
            .map_err(|e| RegistryValidationError::Manifest {
                path: file.clone(),
                message: e.to_string(),
            })
            .and_then(|content| parse_manifest(&content, &file));

        match result {
            Ok(plugin) => {
                tracing::debug!("Loaded drop-in plugin '{}' from {}", plugin.id(), file.display());
                plugins.push(Arc::new(plugin));
            }
            Err(e) => rejected.push(e),
        }
    }

    (plugins, rejected)
}
