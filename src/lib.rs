//! Sweep - plugin-driven disk space reclamation
//!
//! This crate provides functionality for:
//! - Discovering cleaning plugins (built-in and drop-in manifests)
//! - Scanning them concurrently with timeouts and cancellation
//! - Cleaning a selection, with privileged items batched behind one elevation
//! - Keeping a history of freed space

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod plugin;
pub mod signals;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Engine, PluginFilter, ScanOptions, Session, SessionState};
pub use error::{Result, SweepError};
pub use plugin::{CancellationToken, CleanOutcome, CleanResult, Finding, Plugin, PluginRegistry};
