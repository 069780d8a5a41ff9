//! Per-plugin clean execution shared by the unprivileged and elevated paths.

use rayon::prelude::*;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::engine::progress::Progress;
use crate::engine::scan::panic_message;
use crate::plugin::{fsops, CleanContext, CleanOutcome, FailureKind, Finding, PluginRegistry};

/// Findings of one plugin, in selection order.
struct Group<'a> {
    plugin_id: &'a str,
    items: Vec<&'a Finding>,
}

fn group_by_plugin(items: &[Finding]) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for item in items {
        let slot = *slots.entry(item.plugin_id.as_str()).or_insert_with(|| {
            groups.push(Group {
                plugin_id: item.plugin_id.as_str(),
                items: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].items.push(item);
    }
    groups
}

/// Clean `items`, one plugin group per pool task.
///
/// Returns exactly one outcome per item, in the order of `items`.
pub fn execute_grouped(
    registry: &PluginRegistry,
    items: &[Finding],
    ctx: &CleanContext,
    parallelism: usize,
    progress: Option<&Arc<Progress>>,
) -> Vec<CleanOutcome> {
    if items.is_empty() {
        return Vec::new();
    }

    let groups = group_by_plugin(items);
    if let Some(progress) = progress {
        progress.reset(groups.len());
    }

    let run = |group: &Group<'_>| {
        if let Some(progress) = progress {
            progress.set_current(Some(group.plugin_id.to_string()));
        }
        let outcomes = clean_group(registry, group, ctx);
        if let Some(progress) = progress {
            progress.increment();
        }
        outcomes
    };

    let raw: Vec<CleanOutcome> = match rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism.max(1))
        .build()
    {
        Ok(pool) => pool.install(|| groups.par_iter().flat_map_iter(run).collect()),
        Err(e) => {
            tracing::warn!("Cannot build clean thread pool ({}), cleaning sequentially", e);
            groups.iter().flat_map(run).collect()
        }
    };

    reconcile(items, raw, "no result from plugin")
}

fn clean_group(registry: &PluginRegistry, group: &Group<'_>, ctx: &CleanContext) -> Vec<CleanOutcome> {
    let findings: Vec<Finding> = group.items.iter().map(|f| (*f).clone()).collect();

    if ctx.is_cancelled() {
        return findings
            .iter()
            .map(|f| CleanOutcome::failure(f, FailureKind::Cancelled, "cancelled"))
            .collect();
    }

    let plugin = match registry.get(group.plugin_id) {
        Ok(plugin) => plugin,
        Err(_) => {
            tracing::warn!(
                "Plugin '{}' is not registered, removing its items directly",
                group.plugin_id
            );
            return findings.iter().map(fsops::remove_finding).collect();
        }
    };

    tracing::info!("Cleaning {} items for '{}'", findings.len(), group.plugin_id);
    match panic::catch_unwind(AssertUnwindSafe(|| plugin.clean(&findings, ctx))) {
        Ok(outcomes) => outcomes,
        Err(payload) => {
            let message = format!("plugin panicked: {}", panic_message(payload.as_ref()));
            tracing::error!("Plugin '{}' {}", group.plugin_id, message);
            findings
                .iter()
                .map(|f| CleanOutcome::failure(f, FailureKind::IoError, message.clone()))
                .collect()
        }
    }
}

/// Match raw outcomes back to `items`, one per item in item order.
///
/// Outcomes for findings that were not requested are dropped; requested
/// findings without an outcome fail with `missing`.
pub fn reconcile(items: &[Finding], raw: Vec<CleanOutcome>, missing: &str) -> Vec<CleanOutcome> {
    let mut by_finding: HashMap<Finding, Vec<CleanOutcome>> = HashMap::new();
    for outcome in raw.into_iter().rev() {
        by_finding
            .entry(outcome.finding().clone())
            .or_default()
            .push(outcome);
    }

    items
        .iter()
        .map(|item| {
            by_finding
                .get_mut(item)
                .and_then(Vec::pop)
                .unwrap_or_else(|| CleanOutcome::failure(item, FailureKind::IoError, missing))
        })
        .collect()
}
