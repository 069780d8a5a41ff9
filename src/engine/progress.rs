//! Progress tracking shared between a coordinator and a front end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Progress tracker for scan and clean phases.
#[derive(Debug)]
pub struct Progress {
    /// Total number of units (plugins or plugin groups).
    total: AtomicUsize,
    /// Number of finished units.
    completed: AtomicUsize,
    /// Plugin currently being worked on.
    current: Mutex<Option<String>>,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            completed: AtomicUsize::new(0),
            current: Mutex::new(None),
        }
    }

    /// Reset for a new phase with `total` units.
    pub fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.set_current(None);
    }

    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_current(&self, name: Option<String>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = name;
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_done(&self) -> bool {
        self.completed() >= self.total()
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(0)
    }
}
