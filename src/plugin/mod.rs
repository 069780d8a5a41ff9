//! Plugin model and discovery.
//!
//! This module provides:
//! - The [`Plugin`] trait and the values it produces ([`Finding`], [`CleanOutcome`])
//! - Plugin identity ([`PluginDescriptor`], [`Category`], [`RiskLevel`])
//! - The [`PluginRegistry`], fed by built-ins and drop-in manifests

pub mod builtins;
mod context;
mod descriptor;
mod directory;
mod finding;
pub mod fsops;
pub mod manifest;
#[allow(clippy::module_inception)]
mod plugin;
mod registry;

pub use context::{CancellationToken, CleanContext, ScanContext};
pub use descriptor::{Category, PluginDescriptor, RiskLevel};
pub use directory::{DirectoryPlugin, ScanMode};
pub use finding::{CleanOutcome, CleanResult, FailureKind, Finding, PluginError, ScanResult};
pub use plugin::{Plugin, PluginFailure};
pub use registry::{validate, PluginRegistry, PluginSource, RegistryWarning, SYSTEM_PLUGIN_DIR};
