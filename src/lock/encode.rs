//! Lock file encoding and decoding.
//!
//! `modules.lock` is a TOML file listing installed modules and the
//! dependency groups they were installed with.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{DependencyGroup, ModuleIdentity};
use crate::lock::ModuleLockState;
use crate::util::hash::Fingerprint;

/// Current lock file format version.
pub const LOCK_VERSION: u32 = 1;

const HEADER: &str = "# This file is automatically generated by fleetmod.\n\
                      # It is not intended for manual editing.\n\n";

/// Lock file representation for serialization.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockFile {
    /// Lock file format version
    pub version: u32,

    /// Fingerprint of the module entries, checked on load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Installed modules
    #[serde(rename = "module", default)]
    pub modules: Vec<LockedModule>,
}

/// One installed module.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockedModule {
    pub name: String,

    /// Exact version
    pub version: String,

    #[serde(default)]
    pub groups: Vec<DependencyGroup>,
}

impl LockFile {
    /// Create a lock file from a state snapshot.
    pub fn from_state(state: &ModuleLockState) -> Self {
        // BTreeMap iteration is already sorted by identity.
        let modules: Vec<LockedModule> = state
            .iter()
            .map(|(identity, groups)| LockedModule {
                name: identity.name().to_string(),
                version: identity.version().to_string(),
                groups: groups.clone(),
            })
            .collect();

        let checksum = Some(checksum(&modules));
        LockFile {
            version: LOCK_VERSION,
            checksum,
            modules,
        }
    }

    /// Check if this lock file version is supported.
    pub fn is_compatible(&self) -> bool {
        self.version == LOCK_VERSION
    }

    /// Parse lock file contents.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let content = std::str::from_utf8(bytes).context("lock file is not valid UTF-8")?;
        toml::from_str(content).context("failed to parse lock file")
    }

    /// Render lock file contents, header included.
    pub fn encode(&self) -> Result<String> {
        let content = toml::to_string_pretty(self).context("failed to serialize lock file")?;
        Ok(format!("{HEADER}{content}"))
    }

    /// Validate and convert to a state snapshot.
    pub fn into_state(self) -> Result<ModuleLockState> {
        if !self.is_compatible() {
            bail!(
                "lock file version {} is not supported (expected {})",
                self.version,
                LOCK_VERSION
            );
        }

        if let Some(expected) = &self.checksum {
            let actual = checksum(&self.modules);
            if &actual != expected {
                bail!("lock file checksum mismatch (expected {expected}, found {actual})");
            }
        }

        let mut state = ModuleLockState::new();
        for module in self.modules {
            let identity = ModuleIdentity::parse(module.name.as_str(), &module.version)
                .with_context(|| {
                    format!("invalid version `{}` for module `{}`", module.version, module.name)
                })?;
            if identity.name().is_empty() {
                bail!("lock file contains a module with an empty name");
            }
            if state.contains_key(&identity) {
                bail!("module {} is listed twice", identity.display_name());
            }
            state.insert(identity, module.groups);
        }

        Ok(state)
    }
}

/// Fingerprint the entries as they appear in the file.
fn checksum(modules: &[LockedModule]) -> String {
    let mut fp = Fingerprint::new();
    for module in modules {
        fp.update_str(&module.name).update_str(&module.version);
        for group in &module.groups {
            fp.update_str(&group.framework);
            for dep in &group.dependencies {
                fp.update_str(&dep.name)
                    .update_str(&dep.version_req.to_string());
            }
        }
    }
    fp.finish()
}
