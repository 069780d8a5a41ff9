//! Plugin registry: discovery, validation and lookup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PluginsConfig;
use crate::error::{RegistryValidationError, Result, SweepError};
use crate::plugin::builtins::all_plugins;
use crate::plugin::descriptor::PluginDescriptor;
use crate::plugin::manifest;
use crate::plugin::Plugin;

/// System-wide drop-in directory.
pub const SYSTEM_PLUGIN_DIR: &str = "/usr/share/sweep/plugins";

/// Where plugins are discovered from, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    Builtin,
    Directory(PathBuf),
}

impl PluginSource {
    /// Built-ins, then the system, user and configured drop-in directories.
    pub fn standard(config: &PluginsConfig) -> Vec<PluginSource> {
        let mut sources = vec![PluginSource::Builtin];
        if !config.skip_system_dir {
            sources.push(PluginSource::Directory(PathBuf::from(SYSTEM_PLUGIN_DIR)));
        }
        if let Some(data) = dirs::data_dir() {
            sources.push(PluginSource::Directory(data.join("sweep").join("plugins")));
        }
        sources.extend(config.extra_dirs.iter().cloned().map(PluginSource::Directory));
        sources
    }
}

/// Something noteworthy that happened during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryWarning {
    /// A later source replaced an earlier plugin with the same id.
    Overridden { id: String, source: String },
    /// A plugin failed validation and was excluded.
    Rejected(RegistryValidationError),
}

/// Read-only set of validated plugins.
///
/// Built once at startup and shared through `Arc`; lookups are safe from
/// any number of threads.
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
    index: HashMap<String, usize>,
    warnings: Vec<RegistryWarning>,
}

impl PluginRegistry {
    /// Discover plugins from `sources`, later sources overriding earlier
    /// ones on id collision.
    pub fn discover(sources: &[PluginSource]) -> Self {
        let mut builder = RegistryBuilder::default();

        for source in sources {
            match source {
                PluginSource::Builtin => {
                    for plugin in all_plugins() {
                        builder.add(plugin, "built-in");
                    }
                }
                PluginSource::Directory(dir) => {
                    let (plugins, rejected) = manifest::load_dir(dir);
                    for err in rejected {
                        builder.reject(err);
                    }
                    let label = dir.display().to_string();
                    for plugin in plugins {
                        builder.add(plugin, &label);
                    }
                }
            }
        }

        let registry = builder.build();
        tracing::info!("Loaded {} plugins", registry.len());
        registry
    }

    /// Build a registry from explicit plugins, validated like discovered
    /// ones. Later plugins override earlier ones with the same id.
    pub fn from_plugins(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let mut builder = RegistryBuilder::default();
        for plugin in plugins {
            builder.add(plugin, "explicit");
        }
        builder.build()
    }

    /// Descriptors ordered by category, then id.
    pub fn list(&self) -> Vec<PluginDescriptor> {
        let mut list: Vec<PluginDescriptor> =
            self.plugins.iter().map(|p| p.descriptor().clone()).collect();
        list.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.id.cmp(&b.id)));
        list
    }

    /// Get a plugin by id.
    pub fn get(&self, id: &str) -> Result<Arc<dyn Plugin>> {
        self.index
            .get(id)
            .map(|&i| Arc::clone(&self.plugins[i]))
            .ok_or_else(|| SweepError::PluginNotFound(id.to_string()))
    }

    pub fn descriptor(&self, id: &str) -> Option<&PluginDescriptor> {
        self.index.get(id).map(|&i| self.plugins[i].descriptor())
    }

    /// Descriptors matching `predicate`, in [`list`](Self::list) order.
    pub fn filter<F>(&self, predicate: F) -> Vec<PluginDescriptor>
    where
        F: Fn(&PluginDescriptor) -> bool,
    {
        self.list().into_iter().filter(|d| predicate(d)).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// List all plugin IDs, in [`list`](Self::list) order.
    pub fn ids(&self) -> Vec<String> {
        self.list().into_iter().map(|d| d.id).collect()
    }

    pub fn warnings(&self) -> &[RegistryWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[derive(Default)]
struct RegistryBuilder {
    plugins: Vec<Arc<dyn Plugin>>,
    index: HashMap<String, usize>,
    warnings: Vec<RegistryWarning>,
}

impl RegistryBuilder {
    fn add(&mut self, plugin: Arc<dyn Plugin>, source: &str) {
        if let Err(err) = validate(plugin.descriptor()) {
            self.reject(err);
            return;
        }

        let id = plugin.id().to_string();
        match self.index.get(&id) {
            Some(&slot) => {
                tracing::warn!("Plugin '{}' from {} overrides an earlier definition", id, source);
                self.warnings.push(RegistryWarning::Overridden {
                    id,
                    source: source.to_string(),
                });
                self.plugins[slot] = plugin;
            }
            None => {
                tracing::debug!("Registered plugin: {} ({})", id, plugin.descriptor().name);
                self.index.insert(id, self.plugins.len());
                self.plugins.push(plugin);
            }
        }
    }

    fn reject(&mut self, err: RegistryValidationError) {
        tracing::warn!("Excluding plugin: {}", err);
        self.warnings.push(RegistryWarning::Rejected(err));
    }

    fn build(self) -> PluginRegistry {
        PluginRegistry {
            plugins: self.plugins,
            index: self.index,
            warnings: self.warnings,
        }
    }
}

/// Check a descriptor's metadata.
pub fn validate(descriptor: &PluginDescriptor) -> std::result::Result<(), RegistryValidationError> {
    let id = &descriptor.id;
    if id.is_empty() {
        return Err(RegistryValidationError::EmptyId);
    }
    let well_formed = id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !well_formed {
        return Err(RegistryValidationError::MalformedId(id.clone()));
    }
    if descriptor.name.trim().is_empty() {
        return Err(RegistryValidationError::EmptyName(id.clone()));
    }
    Ok(())
}
