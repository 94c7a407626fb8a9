//! Search-side module metadata.
//!
//! These are the items sources return and the engine ranks: an identity plus
//! the descriptive text used for relevance scoring.

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::core::{DependencyGroup, ModuleIdentity};

/// Metadata describing one module as reported by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSearchMetadata {
    /// Identity of the latest matching release
    pub identity: ModuleIdentity,

    /// Human-friendly title, if different from the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Total downloads reported by the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_count: Option<u64>,

    /// Every version known for this module, newest first
    #[serde(default)]
    pub versions: Vec<Version>,

    /// Dependency groups of the release named by `identity`
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
}

impl ModuleSearchMetadata {
    /// Create metadata with just an identity.
    pub fn new(identity: ModuleIdentity) -> Self {
        let versions = vec![identity.version().clone()];
        ModuleSearchMetadata {
            identity,
            title: None,
            description: String::new(),
            authors: Vec::new(),
            tags: Vec::new(),
            download_count: None,
            versions,
            dependency_groups: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_download_count(mut self, count: u64) -> Self {
        self.download_count = Some(count);
        self
    }

    pub fn with_dependency_groups(mut self, groups: Vec<DependencyGroup>) -> Self {
        self.dependency_groups = groups;
        self
    }

    /// Module name.
    pub fn name(&self) -> &str {
        self.identity.name()
    }

    /// Title to show to users, falling back to the name.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or_else(|| self.identity.name())
    }
}

/// Filter criteria shared by every source of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Include pre-release versions
    #[serde(default)]
    pub include_prerelease: bool,

    /// Only modules with a dependency group for this framework (or `any`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

impl SearchFilter {
    /// Check whether a version passes the pre-release criterion.
    pub fn accepts_version(&self, version: &Version) -> bool {
        self.include_prerelease || version.pre.is_empty()
    }

    /// Check whether a set of dependency groups passes the framework criterion.
    pub fn accepts_groups(&self, groups: &[DependencyGroup]) -> bool {
        match &self.framework {
            None => true,
            Some(framework) => {
                groups.is_empty()
                    || groups
                        .iter()
                        .any(|g| g.targets(framework) || g.is_framework_neutral())
            }
        }
    }
}
