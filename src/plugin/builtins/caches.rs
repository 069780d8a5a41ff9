//! Built-ins that are plain directory plugins.

use std::path::PathBuf;

use crate::plugin::descriptor::{Category, PluginDescriptor, RiskLevel};
use crate::plugin::directory::{DirectoryPlugin, ScanMode};
use crate::plugin::fsops::expand_home;

fn cache_home() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(|| expand_home("~/.cache"))
}

/// Freedesktop thumbnail cache.
pub fn thumbnails() -> DirectoryPlugin {
    DirectoryPlugin::new(
        PluginDescriptor::new("thumbnails", "Thumbnail cache", Category::Other, RiskLevel::Safe)
            .with_description("Image previews, regenerated by file managers on demand."),
        vec![cache_home().join("thumbnails")],
        ScanMode::Contents,
    )
}

/// Downloaded crate archives kept by Cargo.
pub fn cargo_cache() -> DirectoryPlugin {
    DirectoryPlugin::new(
        PluginDescriptor::new("cargo_cache", "Cargo registry cache", Category::DevTool, RiskLevel::Caution)
            .with_description("Downloaded crate archives; Cargo fetches them again on the next build."),
        vec![expand_home("~/.cargo/registry/cache")],
        ScanMode::Contents,
    )
}

/// npm content-addressable cache.
pub fn npm_cache() -> DirectoryPlugin {
    DirectoryPlugin::new(
        PluginDescriptor::new("npm_cache", "npm cache", Category::DevTool, RiskLevel::Caution)
            .with_description("npm package tarball cache; rebuilt by the next install."),
        vec![expand_home("~/.npm/_cacache")],
        ScanMode::Whole,
    )
}

/// Pacman package cache.
pub fn pacman_cache() -> DirectoryPlugin {
    DirectoryPlugin::new(
        PluginDescriptor::new(
            "pacman_cache",
            "Pacman package cache",
            Category::PackageManager,
            RiskLevel::Caution,
        )
        .with_description("Cached packages; removing them prevents downgrades without a re-download.")
        .privileged(),
        vec![PathBuf::from("/var/cache/pacman/pkg")],
        ScanMode::Contents,
    )
}

/// systemd-coredump crash dumps.
pub fn coredumps() -> DirectoryPlugin {
    DirectoryPlugin::new(
        PluginDescriptor::new("coredumps", "Crash dumps", Category::System, RiskLevel::Caution)
            .with_description("Core dumps of crashed programs, only useful for debugging.")
            .privileged(),
        vec![PathBuf::from("/var/lib/systemd/coredump")],
        ScanMode::Contents,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Plugin;

    #[test]
    fn test_privileged_builtins_declare_it() {
        assert!(pacman_cache().descriptor().requires_privilege);
        assert!(coredumps().descriptor().requires_privilege);
        assert!(!thumbnails().descriptor().requires_privilege);
    }

    #[test]
    fn test_cache_modes() {
        assert_eq!(npm_cache().mode(), ScanMode::Whole);
        assert_eq!(cargo_cache().mode(), ScanMode::Contents);
    }
}
