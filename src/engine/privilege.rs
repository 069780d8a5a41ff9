//! Batching of privileged clean operations behind a single elevation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use crate::engine::execute::reconcile;
use crate::plugin::{CleanContext, CleanOutcome, FailureKind, Finding};

/// Serializes use of the privileged channel across the whole process.
static PRIVILEGED_CHANNEL: Mutex<()> = Mutex::new(());

/// Everything the elevated side needs to perform one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDescriptor {
    pub items: Vec<Finding>,
    /// Distinct plugin ids involved, sorted.
    pub plugin_ids: Vec<String>,
}

impl BatchDescriptor {
    pub fn new(items: Vec<Finding>) -> Self {
        let plugin_ids: BTreeSet<String> = items.iter().map(|f| f.plugin_id.clone()).collect();
        Self {
            items,
            plugin_ids: plugin_ids.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElevationError {
    #[error("elevation request was dismissed")]
    Declined,

    #[error("not authorized to elevate")]
    Denied,

    #[error("elevation unavailable: {0}")]
    Unavailable(String),

    #[error("privileged helper timed out after {0:?}")]
    Timeout(Duration),

    #[error("privileged helper failed: {0}")]
    Failed(String),
}

/// Platform mechanism that grants elevated privileges.
pub trait Elevator: Send + Sync {
    /// Ask for elevation once. May prompt the user.
    fn request_elevation(
        &self,
        batch: &BatchDescriptor,
    ) -> Result<Box<dyn ElevatedHandle>, ElevationError>;
}

/// An acquired elevation, good for one batch.
pub trait ElevatedHandle: Send {
    /// Perform the batch, returning outcomes for its items.
    fn execute(self: Box<Self>, batch: &BatchDescriptor) -> Result<Vec<CleanOutcome>, ElevationError>;
}

/// Groups privileged findings so one clean call needs at most one elevation.
pub struct PrivilegeBatcher {
    elevator: Arc<dyn Elevator>,
}

impl PrivilegeBatcher {
    pub fn new(elevator: Arc<dyn Elevator>) -> Self {
        Self { elevator }
    }

    /// Split findings into `(unprivileged, privileged)`, preserving order.
    pub fn partition(items: &[Finding]) -> (Vec<Finding>, Vec<Finding>) {
        items.iter().cloned().partition(|f| !f.requires_privilege)
    }

    /// Execute every privileged item through a single elevation.
    ///
    /// Returns one outcome per item in `items` order. An empty batch or a
    /// cancelled `ctx` never contacts the elevator. If elevation fails for
    /// any reason, every item fails with `PermissionDenied` and the
    /// elevation error as its message.
    pub fn execute_privileged(&self, items: &[Finding], ctx: &CleanContext) -> Vec<CleanOutcome> {
        if items.is_empty() {
            return Vec::new();
        }
        if ctx.is_cancelled() {
            return fail_all(items, FailureKind::Cancelled, "cancelled");
        }

        let batch = BatchDescriptor::new(items.to_vec());
        let _channel = PRIVILEGED_CHANNEL
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        // the session may have been cancelled while waiting for the channel
        if ctx.is_cancelled() {
            return fail_all(items, FailureKind::Cancelled, "cancelled");
        }

        tracing::info!(
            "Requesting elevation for {} items from {:?}",
            batch.items.len(),
            batch.plugin_ids
        );

        let result = self
            .elevator
            .request_elevation(&batch)
            .and_then(|handle| handle.execute(&batch));

        match result {
            Ok(raw) => reconcile(items, raw, "no result from privileged helper"),
            Err(e) => {
                tracing::warn!("Privileged batch failed: {}", e);
                fail_all(items, FailureKind::PermissionDenied, &e.to_string())
            }
        }
    }
}

fn fail_all(items: &[Finding], kind: FailureKind, message: &str) -> Vec<CleanOutcome> {
    items
        .iter()
        .map(|f| CleanOutcome::failure(f, kind, message))
        .collect()
}
