//! Built-in plugins.

mod apt_cache;
mod browser_cache;
mod caches;
mod journal_logs;
mod trash;

pub use apt_cache::AptCachePlugin;
pub use browser_cache::BrowserCachePlugin;
pub use caches::{cargo_cache, coredumps, npm_cache, pacman_cache, thumbnails};
pub use journal_logs::JournalLogsPlugin;
pub use trash::TrashPlugin;

use std::sync::Arc;

use crate::plugin::Plugin;

/// Returns all built-in plugins.
pub fn all_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(BrowserCachePlugin::new()),
        Arc::new(AptCachePlugin::new()),
        Arc::new(pacman_cache()),
        Arc::new(cargo_cache()),
        Arc::new(npm_cache()),
        Arc::new(coredumps()),
        Arc::new(JournalLogsPlugin::new()),
        Arc::new(TrashPlugin::new()),
        Arc::new(thumbnails()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_are_unique() {
        let plugins = all_plugins();
        let ids: HashSet<&str> = plugins.iter().map(|p| p.id()).collect();
        assert_eq!(ids.len(), plugins.len());
        assert_eq!(plugins.len(), 9);
    }

    #[test]
    fn test_builtins_include_trash() {
        assert!(all_plugins().iter().any(|p| p.id() == "trash"));
    }
}
