//! Plugin execution engine.
//!
//! This module provides:
//! - Concurrent scanning with timeouts and cancellation ([`ScanCoordinator`])
//! - Validated cleaning of a scanned selection ([`CleanCoordinator`])
//! - Batching of privileged removals behind one elevation ([`PrivilegeBatcher`])
//! - The [`Engine`] facade tying them together

mod clean;
pub mod elevation;
mod execute;
mod privilege;
mod progress;
mod scan;
mod session;

pub use clean::CleanCoordinator;
pub use elevation::{default_elevator, run_elevated_batch, InProcessElevator, PkexecElevator};
pub use execute::{execute_grouped, reconcile};
pub use privilege::{BatchDescriptor, ElevatedHandle, ElevationError, Elevator, PrivilegeBatcher};
pub use progress::Progress;
pub use scan::{
    run_plugin, sort_findings, ScanCoordinator, ScanOptions, CANCELLED_MESSAGE, TIMEOUT_MESSAGE,
    UNKNOWN_MESSAGE,
};
pub use session::{PluginScan, Session, SessionState};

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::plugin::{
    Category, CleanResult, Finding, PluginDescriptor, PluginRegistry, PluginSource, RiskLevel,
};

/// Criteria for [`Engine::list_plugins`].
#[derive(Debug, Clone, Default)]
pub struct PluginFilter {
    pub category: Option<Category>,
    /// Highest risk level to include.
    pub max_risk: Option<RiskLevel>,
}

impl PluginFilter {
    pub fn matches(&self, descriptor: &PluginDescriptor) -> bool {
        self.category.map_or(true, |c| descriptor.category == c)
            && self.max_risk.map_or(true, |r| descriptor.risk <= r)
    }
}

/// Entry point for front ends.
pub struct Engine {
    registry: Arc<PluginRegistry>,
    scanner: ScanCoordinator,
    cleaner: CleanCoordinator,
}

impl Engine {
    pub fn new(registry: Arc<PluginRegistry>, config: &Config, elevator: Arc<dyn Elevator>) -> Self {
        Self {
            scanner: ScanCoordinator::new(Arc::clone(&registry), &config.engine),
            cleaner: CleanCoordinator::new(
                Arc::clone(&registry),
                PrivilegeBatcher::new(elevator),
                config.clean.parallel_jobs,
            ),
            registry,
        }
    }

    /// Discover plugins from the standard sources and pick the elevator for
    /// this process.
    pub fn from_config(config: &Config) -> Self {
        let registry = Arc::new(PluginRegistry::discover(&PluginSource::standard(
            &config.plugins,
        )));
        let elevator = default_elevator(config, &registry);
        Self::new(registry, config, elevator)
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Descriptors matching `filter`, ordered by category then id.
    pub fn list_plugins(&self, filter: &PluginFilter) -> Vec<PluginDescriptor> {
        self.registry.filter(|d| filter.matches(d))
    }

    pub fn scan<I, S>(&self, plugin_ids: I, options: &ScanOptions) -> Session
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scanner.scan(plugin_ids, options)
    }

    /// Request cancellation of the session's running scan or clean.
    pub fn cancel(&self, session: &Session) {
        tracing::info!("Cancellation requested");
        session.cancel_token().cancel();
    }

    pub fn clean(&self, session: &mut Session, selection: &[Finding]) -> Result<CleanResult> {
        self.cleaner.clean(session, selection, None)
    }

    /// Like [`clean`](Self::clean), publishing per-plugin progress.
    pub fn clean_with_progress(
        &self,
        session: &mut Session,
        selection: &[Finding],
        progress: &Arc<Progress>,
    ) -> Result<CleanResult> {
        self.cleaner.clean(session, selection, Some(progress))
    }

    pub fn describe_risk(&self, plugin_id: &str) -> Result<RiskLevel> {
        Ok(self.registry.get(plugin_id)?.descriptor().risk)
    }
}
