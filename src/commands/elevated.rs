//! Privileged helper entry point, run as `pkexec sweep clean-as-root`.

use anyhow::{Context, Result};
use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::engine::{run_elevated_batch, BatchDescriptor};
use crate::plugin::{PluginRegistry, PluginSource, SYSTEM_PLUGIN_DIR};

/// Read a batch from stdin, clean it, write outcomes to stdout.
///
/// Only built-ins and system drop-ins are trusted here; user drop-in
/// directories are not consulted with elevated privileges.
pub fn run(config: &Config) -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read batch from stdin")?;
    let batch: BatchDescriptor =
        serde_json::from_str(&input).context("malformed batch descriptor")?;

    tracing::info!(
        "Elevated helper running {} items for {:?}",
        batch.items.len(),
        batch.plugin_ids
    );

    let registry = PluginRegistry::discover(&[
        PluginSource::Builtin,
        PluginSource::Directory(PathBuf::from(SYSTEM_PLUGIN_DIR)),
    ]);
    let outcomes = run_elevated_batch(&registry, &batch, config.clean.parallel_jobs);

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &outcomes)?;
    stdout.flush()?;
    Ok(())
}
