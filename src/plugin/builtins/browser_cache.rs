//! Browser cache plugin.

use std::fs;
use std::path::{Path, PathBuf};

use crate::plugin::descriptor::{Category, PluginDescriptor, RiskLevel};
use crate::plugin::finding::Finding;
use crate::plugin::fsops;
use crate::plugin::{Plugin, PluginFailure, ScanContext};

/// Browser profile layouts under the cache root: (browser, directory
/// holding profiles, cache directory inside each profile).
const LAYOUTS: &[(&str, &str, &str)] = &[
    ("Firefox", "mozilla/firefox", "cache2"),
    ("Chrome", "google-chrome", "Cache"),
    ("Chromium", "chromium", "Cache"),
    ("Brave", "BraveSoftware/Brave-Browser", "Cache"),
];

/// Removes per-profile HTTP caches of common browsers.
pub struct BrowserCachePlugin {
    descriptor: PluginDescriptor,
    cache_root: PathBuf,
}

impl BrowserCachePlugin {
    pub fn new() -> Self {
        let root = dirs::cache_dir().unwrap_or_else(|| fsops::expand_home("~/.cache"));
        Self::with_cache_root(root)
    }

    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            descriptor: PluginDescriptor::new(
                "browser_cache",
                "Browser caches",
                Category::Browser,
                RiskLevel::Safe,
            )
            .with_description("Cached web content; browsers download it again when needed."),
            cache_root,
        }
    }

    fn profiles(dir: &Path) -> Vec<PathBuf> {
        let mut profiles: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => Vec::new(),
        };
        profiles.sort();
        profiles
    }
}

impl Default for BrowserCachePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for BrowserCachePlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn unavailable_reason(&self) -> Option<String> {
        let any = LAYOUTS
            .iter()
            .any(|(_, dir, _)| self.cache_root.join(dir).is_dir());
        if any {
            None
        } else {
            Some("No supported browser found".to_string())
        }
    }

    fn scan(&self, ctx: &ScanContext) -> Result<Vec<Finding>, PluginFailure> {
        let mut findings = Vec::new();

        for (browser, dir, cache) in LAYOUTS {
            for profile in Self::profiles(&self.cache_root.join(dir)) {
                let name = profile
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let reason = format!("{} cache ({})", browser, name);
                if let Some(f) =
                    fsops::whole_dir_finding(self.id(), &profile.join(cache), &reason, false, ctx)?
                {
                    findings.push(f);
                }
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::CancellationToken;
    use tempfile::TempDir;

    #[test]
    fn test_browser_cache_finds_profiles() {
        let tmp = TempDir::new().unwrap();
        let ff = tmp.path().join("mozilla/firefox/abc.default/cache2");
        let chrome = tmp.path().join("google-chrome/Default/Cache");
        fs::create_dir_all(&ff).unwrap();
        fs::create_dir_all(&chrome).unwrap();
        fs::write(ff.join("entry"), "x".repeat(300)).unwrap();
        fs::write(chrome.join("data_1"), "x".repeat(200)).unwrap();

        let plugin = BrowserCachePlugin::with_cache_root(tmp.path().to_path_buf());
        let findings = plugin.scan(&ScanContext::new(CancellationToken::new())).unwrap();

        assert_eq!(findings.len(), 2);
        assert!(findings[0].reason.starts_with("Firefox"));
        assert_eq!(findings[0].size, 300);
        assert_eq!(findings[1].path, chrome);
    }

    #[test]
    fn test_browser_cache_unavailable_without_browsers() {
        let tmp = TempDir::new().unwrap();
        let plugin = BrowserCachePlugin::with_cache_root(tmp.path().to_path_buf());
        assert!(plugin.unavailable_reason().is_some());
    }
}
