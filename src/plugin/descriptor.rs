//! Plugin identity: descriptor, category and risk level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of data a plugin reclaims.
///
/// Declaration order is the presentation order of scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Browser,
    PackageManager,
    DevTool,
    System,
    Trash,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Browser,
        Category::PackageManager,
        Category::DevTool,
        Category::System,
        Category::Trash,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Browser => "browser",
            Category::PackageManager => "package-manager",
            Category::DevTool => "dev-tool",
            Category::System => "system",
            Category::Trash => "trash",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Plugin-declared classification used to gate selection and confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Regenerated automatically, nothing of value is lost
    Safe,
    /// Usually fine, but may cost a re-download or lose some state
    Caution,
    /// May remove data the user still wants; requires explicit confirmation
    Dangerous,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Caution => "caution",
            RiskLevel::Dangerous => "dangerous",
        }
    }

    /// Whether a front end must ask before cleaning this plugin's findings.
    pub fn needs_confirmation(&self) -> bool {
        *self == RiskLevel::Dangerous
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe" => Ok(RiskLevel::Safe),
            "caution" => Ok(RiskLevel::Caution),
            "dangerous" => Ok(RiskLevel::Dangerous),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// Immutable identity of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique identifier (e.g., "apt_cache").
    pub id: String,
    /// Human-readable name (e.g., "APT package cache").
    pub name: String,
    /// What the plugin removes and why that is acceptable.
    pub description: String,
    pub category: Category,
    pub risk: RiskLevel,
    /// Whether the plugin generally needs root. Individual findings carry
    /// their own flag, which is what the clean path acts on.
    pub requires_privilege: bool,
}

impl PluginDescriptor {
    pub fn new(id: &str, name: &str, category: Category, risk: RiskLevel) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            category,
            risk,
            requires_privilege: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn privileged(mut self) -> Self {
        self.requires_privilege = true;
        self
    }
}
