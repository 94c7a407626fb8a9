//! Module identification - WHICH module (name + version).
//!
//! A ModuleIdentity is the natural key of the lock store and of search
//! results. Names compare case-insensitively, versions semantically.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use semver::Version;
use serde::{Deserialize, Serialize};

/// A unique identifier for a module release.
#[derive(Clone)]
pub struct ModuleIdentity {
    name: String,
    version: Version,
}

impl ModuleIdentity {
    /// Create a new module identity.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        ModuleIdentity {
            name: name.into(),
            version,
        }
    }

    /// Parse an identity from a name and a version string.
    pub fn parse(name: impl Into<String>, version: &str) -> Result<Self, semver::Error> {
        Ok(Self::new(name, Version::parse(version)?))
    }

    /// Get the module name, as originally written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the module version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Get a display string like "name v1.2.3"
    pub fn display_name(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }

    /// Check whether this identity names the given module, ignoring case.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn folded_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

impl PartialEq for ModuleIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.is_named(&other.name) && self.version == other.version
    }
}

impl Eq for ModuleIdentity {}

impl Hash for ModuleIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded_name().hash(state);
        self.version.hash(state);
    }
}

impl PartialOrd for ModuleIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModuleIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded_name()
            .cmp(&other.folded_name())
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl fmt::Debug for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleIdentity")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish()
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

impl Serialize for ModuleIdentity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct ModuleIdentityData<'a> {
            name: &'a str,
            version: String,
        }

        ModuleIdentityData {
            name: &self.name,
            version: self.version.to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ModuleIdentity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ModuleIdentityData {
            name: String,
            version: String,
        }

        let data = ModuleIdentityData::deserialize(deserializer)?;
        if data.name.trim().is_empty() {
            return Err(serde::de::Error::custom("module name cannot be empty"));
        }
        let version = data.version.parse().map_err(serde::de::Error::custom)?;

        Ok(ModuleIdentity::new(data.name, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_equality_ignores_name_case() {
        let a = ModuleIdentity::new("UserInteraction", Version::new(1, 0, 0));
        let b = ModuleIdentity::new("userinteraction", Version::new(1, 0, 0));

        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_identity_different_versions() {
        let a = ModuleIdentity::new("tasks", Version::new(1, 0, 0));
        let b = ModuleIdentity::new("tasks", Version::new(2, 0, 0));

        assert_ne!(a, b);
    }

    #[test]
    fn test_ordering_is_semantic() {
        let v9 = ModuleIdentity::parse("tasks", "1.9.0").unwrap();
        let v10 = ModuleIdentity::parse("tasks", "1.10.0").unwrap();
        let pre = ModuleIdentity::parse("tasks", "1.10.0-beta.1").unwrap();

        assert!(v9 < v10);
        assert!(pre < v10);
        assert!(v9 < pre);
    }

    #[test]
    fn test_ordering_by_name_first() {
        let a = ModuleIdentity::parse("Alpha", "9.0.0").unwrap();
        let b = ModuleIdentity::parse("beta", "1.0.0").unwrap();

        assert!(a < b);
    }

    #[test]
    fn test_serde_shape() {
        let id = ModuleIdentity::parse("RemoteDesktop", "2.1.0").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"name":"RemoteDesktop","version":"2.1.0"}"#);

        let back: ModuleIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_deserialize_rejects_bad_version() {
        let result: Result<ModuleIdentity, _> =
            serde_json::from_str(r#"{"name":"x","version":"one"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        let id = ModuleIdentity::new("FileExplorer", Version::new(1, 2, 3));
        assert_eq!(id.display_name(), "FileExplorer v1.2.3");
        assert_eq!(id.to_string(), "FileExplorer 1.2.3");
    }
}
