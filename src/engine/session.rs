//! Stateful record of one scan and its optional clean.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::SystemTime;

use crate::error::{Result, SweepError};
use crate::plugin::{CancellationToken, CleanResult, Finding, PluginDescriptor, PluginError, ScanResult};

/// Lifecycle of a session.
///
/// `Idle → Scanning → Scanned → Cleaning → Cleaned | PartiallyCleaned`,
/// with `Scanning → Cancelled`. Cleaning is only reachable from `Scanned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Scanning,
    Scanned,
    Cancelled,
    Cleaning,
    Cleaned,
    PartiallyCleaned,
}

impl SessionState {
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Idle, Scanning)
                | (Scanning, Scanned)
                | (Scanning, Cancelled)
                | (Scanned, Cleaning)
                | (Cleaning, Cleaned)
                | (Cleaning, PartiallyCleaned)
        )
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Cancelled | SessionState::Cleaned | SessionState::PartiallyCleaned
        )
    }
}

/// Scan outcome of one requested plugin id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginScan {
    pub plugin_id: String,
    /// `None` when the id is unknown to the registry.
    pub descriptor: Option<PluginDescriptor>,
    pub result: ScanResult,
}

/// One scan and its optional subsequent clean.
///
/// Owned by the caller; mutated only by the coordinator running the current
/// phase, through `&mut`.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    started_at: SystemTime,
    finished_at: Option<SystemTime>,
    results: Vec<PluginScan>,
    scanned: HashSet<Finding>,
    clean_result: Option<CleanResult>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            state: SessionState::Idle,
            started_at: SystemTime::now(),
            finished_at: None,
            results: Vec::new(),
            scanned: HashSet::new(),
            clean_result: None,
            cancel,
        }
    }

    /// Move to `to`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, to: SessionState) -> Result<()> {
        if !self.state.can_transition(to) {
            return Err(SweepError::InvalidState {
                from: self.state,
                to,
            });
        }
        tracing::debug!("Session {:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Store ordered scan results and close the scan phase.
    pub(crate) fn finish_scan(&mut self, results: Vec<PluginScan>, cancelled: bool) -> Result<()> {
        self.scanned = results
            .iter()
            .flat_map(|r| r.result.findings().iter().cloned())
            .collect();
        self.results = results;
        self.finished_at = Some(SystemTime::now());
        self.transition(if cancelled {
            SessionState::Cancelled
        } else {
            SessionState::Scanned
        })
    }

    pub(crate) fn finish_clean(&mut self, result: CleanResult) -> Result<()> {
        let to = if result.is_complete() {
            SessionState::Cleaned
        } else {
            SessionState::PartiallyCleaned
        };
        self.clean_result = Some(result);
        self.transition(to)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<SystemTime> {
        self.finished_at
    }

    /// Per-plugin results, ordered by category then plugin id.
    pub fn results(&self) -> &[PluginScan] {
        &self.results
    }

    pub fn result(&self, plugin_id: &str) -> Option<&ScanResult> {
        self.results
            .iter()
            .find(|r| r.plugin_id == plugin_id)
            .map(|r| &r.result)
    }

    /// All findings in presentation order.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.results.iter().flat_map(|r| r.result.findings())
    }

    pub fn errors(&self) -> impl Iterator<Item = &PluginError> {
        self.results.iter().filter_map(|r| r.result.error())
    }

    /// Whether `finding` was reported by this session's scan.
    pub fn contains(&self, finding: &Finding) -> bool {
        self.scanned.contains(finding)
    }

    pub fn total_size(&self) -> u64 {
        self.findings().map(|f| f.size).sum()
    }

    pub fn clean_result(&self) -> Option<&CleanResult> {
        self.clean_result.as_ref()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
