//! Contexts handed to plugins during scan and clean.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::plugin::PluginFailure;

/// Session-wide cooperative cancellation signal.
///
/// Cloning shares the underlying flag. Plugins poll it between filesystem
/// operations; nothing is ever forcibly interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Passed to [`Plugin::scan`](super::Plugin::scan).
#[derive(Debug, Clone)]
pub struct ScanContext {
    cancel: CancellationToken,
}

impl ScanContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `Err(PluginFailure::Cancelled)` once the session is cancelled.
    ///
    /// Call this between filesystem operations.
    pub fn checkpoint(&self) -> Result<(), PluginFailure> {
        if self.cancel.is_cancelled() {
            Err(PluginFailure::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Passed to [`Plugin::clean`](super::Plugin::clean).
#[derive(Debug, Clone)]
pub struct CleanContext {
    cancel: CancellationToken,
    elevated: bool,
}

impl CleanContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            elevated: false,
        }
    }

    /// Context for items executed inside the privileged pass.
    pub fn elevated(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            elevated: true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether this clean runs with elevated privileges.
    pub fn is_elevated(&self) -> bool {
        self.elevated
    }
}
