//! Configuration file support for fleetmod.
//!
//! fleetmod supports two configuration file locations:
//! - Global: `~/.fleetmod/config.toml` - User-wide defaults
//! - Project: `.fleetmod/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.
//!
//! ## Example
//!
//! ```toml
//! [search]
//! timeout_secs = 5
//! page_size = 25
//!
//! [[sources]]
//! name = "official"
//! url = "https://modules.example.com/query"
//! priority = 0
//!
//! [[sources]]
//! name = "local"
//! url = "/srv/modules/index"
//!
//! [lock]
//! path = ".fleetmod/modules.lock"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::concurrency::MAX_DEGREE_OF_PARALLELISM;

/// fleetmod configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search settings
    pub search: SearchConfig,

    /// Configured module sources
    pub sources: Vec<SourceEntry>,

    /// Lock file settings
    pub lock: LockConfig,
}

/// Search-related configuration.
///
/// Every field is optional on disk so that a later layer can set any value,
/// including the default one. Read the effective values through the accessors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// How long a search waits for slow sources before returning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Results requested from each source per page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,

    /// Upper bound on concurrent per-module lookups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallelism: Option<usize>,

    /// Include pre-release versions by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_prerelease: Option<bool>,
}

impl SearchConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
    pub const DEFAULT_PAGE_SIZE: usize = 25;

    /// The search timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(Self::DEFAULT_TIMEOUT_SECS))
    }

    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE)
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism.unwrap_or(MAX_DEGREE_OF_PARALLELISM)
    }

    pub fn include_prerelease(&self) -> bool {
        self.include_prerelease.unwrap_or(false)
    }

    fn merge(&mut self, other: SearchConfig) {
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.page_size.is_some() {
            self.page_size = other.page_size;
        }
        if other.max_parallelism.is_some() {
            self.max_parallelism = other.max_parallelism;
        }
        if other.include_prerelease.is_some() {
            self.include_prerelease = other.include_prerelease;
        }
    }
}

/// A configured module source.
///
/// Sources are listed in priority order (lower = higher priority).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Unique source name, used as the key in search statuses and cursors
    pub name: String,

    /// HTTP(S) search endpoint, or a path to a local index directory
    pub url: String,

    /// Priority (lower = higher priority)
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Whether this source is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_priority() -> i32 {
    100
}

fn default_true() -> bool {
    true
}

impl SourceEntry {
    /// Create a new source entry.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        SourceEntry {
            name: name.into(),
            url: url.into(),
            priority: default_priority(),
            enabled: true,
        }
    }

    /// Create a source entry with a specific priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Disable this source.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check whether the url names a remote endpoint.
    pub fn is_remote(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }
}

/// Lock file configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lock file path, relative to the project directory
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Search settings set in `other` win, whatever their value. Sources
    /// with the same name are replaced, new ones added.
    pub fn merge(&mut self, other: Config) {
        self.search.merge(other.search);

        for source in other.sources {
            match self.sources.iter_mut().find(|s| s.name == source.name) {
                Some(existing) => *existing = source,
                None => self.sources.push(source),
            }
        }
        self.sources.sort_by_key(|s| s.priority);

        if other.lock.path.is_some() {
            self.lock.path = other.lock.path;
        }
    }

    /// Get enabled sources in priority order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceEntry> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Find a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.fleetmod/config.toml)
/// 2. Global config (~/.fleetmod/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global fleetmod config directory (~/.fleetmod).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".fleetmod"))
}

/// Get the global config path (~/.fleetmod/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.fleetmod/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".fleetmod").join("config.toml")
}
