//! Clean coordinator: validates a selection and executes it.

use std::collections::HashSet;
use std::sync::Arc;

use crate::engine::execute::execute_grouped;
use crate::engine::privilege::PrivilegeBatcher;
use crate::engine::progress::Progress;
use crate::engine::session::{Session, SessionState};
use crate::error::{Result, SweepError};
use crate::plugin::{CleanContext, CleanOutcome, CleanResult, Finding, PluginRegistry};

pub struct CleanCoordinator {
    registry: Arc<PluginRegistry>,
    batcher: PrivilegeBatcher,
    parallelism: usize,
}

impl CleanCoordinator {
    pub fn new(registry: Arc<PluginRegistry>, batcher: PrivilegeBatcher, parallelism: usize) -> Self {
        Self {
            registry,
            batcher,
            parallelism: parallelism.max(1),
        }
    }

    /// Clean `selection`, which must be drawn from `session`'s scan.
    ///
    /// Fails without touching anything if the session is not `Scanned` or
    /// the selection names a finding the scan did not report. Otherwise
    /// returns one outcome per distinct selected finding, in selection
    /// order, and moves the session to `Cleaned` or `PartiallyCleaned`.
    pub fn clean(
        &self,
        session: &mut Session,
        selection: &[Finding],
        progress: Option<&Arc<Progress>>,
    ) -> Result<CleanResult> {
        if session.state() != SessionState::Scanned {
            return Err(SweepError::InvalidState {
                from: session.state(),
                to: SessionState::Cleaning,
            });
        }

        let mut seen = HashSet::new();
        let selection: Vec<Finding> = selection
            .iter()
            .filter(|f| seen.insert(*f))
            .cloned()
            .collect();

        if let Some(stale) = selection.iter().find(|f| !session.contains(f)) {
            return Err(SweepError::StaleSelection {
                plugin_id: stale.plugin_id.clone(),
                path: stale.path.clone(),
            });
        }

        session.transition(SessionState::Cleaning)?;

        let (plain, privileged) = PrivilegeBatcher::partition(&selection);
        tracing::info!(
            "Cleaning {} items ({} privileged)",
            selection.len(),
            privileged.len()
        );

        let ctx = CleanContext::new(session.cancel_token());
        let plain_outcomes = execute_grouped(&self.registry, &plain, &ctx, self.parallelism, progress);
        let root_outcomes = self.batcher.execute_privileged(&privileged, &ctx);

        let outcomes = merge(&selection, plain_outcomes, root_outcomes);
        let result = CleanResult::from_outcomes(outcomes);

        tracing::info!(
            "Clean finished: {} removed, {} failed, {} bytes freed",
            result.success_count(),
            result.failed_count(),
            result.total_freed
        );
        session.finish_clean(result.clone())?;
        Ok(result)
    }
}

/// Interleave the two partitions back into selection order.
fn merge(
    selection: &[Finding],
    plain: Vec<CleanOutcome>,
    privileged: Vec<CleanOutcome>,
) -> Vec<CleanOutcome> {
    let mut plain = plain.into_iter();
    let mut privileged = privileged.into_iter();
    selection
        .iter()
        .filter_map(|f| {
            if f.requires_privilege {
                privileged.next()
            } else {
                plain.next()
            }
        })
        .collect()
}
