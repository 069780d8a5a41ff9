//! Subcommand implementations.

pub mod clean;
pub mod elevated;
pub mod info;
pub mod list;
pub mod scan;
pub mod stats;

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::engine::{Engine, Progress};
use crate::plugin::{Category, PluginRegistry, RiskLevel};

/// Plugin ids to run.
///
/// Named ids are used as given, so unknown ones surface as scan errors.
/// Without names, every plugin in `category` (or every plugin) is used,
/// leaving out dangerous ones unless `include_dangerous` is set.
pub fn resolve_plugins(
    registry: &PluginRegistry,
    named: &[String],
    category: Option<Category>,
    include_dangerous: bool,
) -> Vec<String> {
    if !named.is_empty() {
        return named.to_vec();
    }
    registry
        .filter(|d| {
            category.map_or(true, |c| d.category == c)
                && (include_dangerous || d.risk != RiskLevel::Dangerous)
        })
        .into_iter()
        .map(|d| d.id)
        .collect()
}

/// Run `work` on a scoped thread while a spinner shows `progress`.
pub(crate) fn with_spinner<T, F>(show: bool, label: &str, progress: &Arc<Progress>, work: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    if !show {
        return work();
    }

    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));

    let outcome = thread::scope(|s| {
        let handle = s.spawn(work);
        while !handle.is_finished() {
            let current = progress.current().unwrap_or_default();
            bar.set_message(format!(
                "{} {}/{} {}",
                label,
                progress.completed(),
                progress.total(),
                current
            ));
            thread::sleep(Duration::from_millis(50));
        }
        handle.join()
    });
    bar.finish_and_clear();

    match outcome {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Look up a plugin's display name, falling back to its id.
pub(crate) fn display_name(engine: &Engine, id: &str) -> String {
    engine
        .registry()
        .descriptor(id)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// Shorten long paths from the left to fit `width` columns.
pub(crate) fn truncate_left(s: &str, width: usize) -> String {
    let count = s.chars().count();
    if count <= width {
        return s.to_string();
    }
    let tail: String = s.chars().skip(count - (width - 3)).collect();
    format!("...{}", tail)
}
