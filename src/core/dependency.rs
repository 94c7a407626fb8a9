//! Dependency groups.
//!
//! A module declares its dependencies per target framework. The lock store
//! keeps these groups verbatim; nothing here solves versions.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// Framework name used by groups that apply to every target.
pub const ANY_FRAMEWORK: &str = "any";

/// A single dependency on another module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    /// Module name
    pub name: String,

    /// Accepted version range
    #[serde(rename = "version")]
    pub version_req: VersionReq,
}

impl ModuleDependency {
    /// Create a new dependency.
    pub fn new(name: impl Into<String>, version_req: VersionReq) -> Self {
        ModuleDependency {
            name: name.into(),
            version_req,
        }
    }

    /// Parse a dependency from a name and a requirement string like `^1.2`.
    pub fn parse(name: impl Into<String>, req: &str) -> Result<Self, semver::Error> {
        Ok(Self::new(name, VersionReq::parse(req)?))
    }

    /// Check if a version satisfies this dependency.
    pub fn matches_version(&self, version: &Version) -> bool {
        self.version_req.matches(version)
    }
}

/// The dependencies a module needs on one target framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGroup {
    /// Target framework or platform (e.g. `net6.0`, `linux-x64`, `any`)
    pub framework: String,

    /// Dependencies, in declaration order
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,
}

impl DependencyGroup {
    /// Create a group for a framework.
    pub fn new(framework: impl Into<String>, dependencies: Vec<ModuleDependency>) -> Self {
        DependencyGroup {
            framework: framework.into(),
            dependencies,
        }
    }

    /// Create a framework-neutral group.
    pub fn any(dependencies: Vec<ModuleDependency>) -> Self {
        Self::new(ANY_FRAMEWORK, dependencies)
    }

    /// Check whether this group applies to every framework.
    pub fn is_framework_neutral(&self) -> bool {
        self.framework.is_empty() || self.framework.eq_ignore_ascii_case(ANY_FRAMEWORK)
    }

    /// Check whether this group targets exactly the given framework.
    pub fn targets(&self, framework: &str) -> bool {
        self.framework.eq_ignore_ascii_case(framework)
    }
}
