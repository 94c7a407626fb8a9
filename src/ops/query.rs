//! Implementation of `fleetmod list`.

use crate::core::{ModuleDependency, ModuleIdentity};
use crate::lock::ModuleLockState;

/// An installed module as seen from one target framework.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameworkModule {
    pub identity: ModuleIdentity,

    /// Framework of the group that applied, `None` if no group did
    pub group: Option<String>,

    pub dependencies: Vec<ModuleDependency>,
}

/// List installed modules with the dependencies they need on `framework`.
///
/// The group targeting `framework` wins; otherwise the framework-neutral
/// group is used; otherwise the module is listed with no dependencies.
pub fn modules_for_framework(state: &ModuleLockState, framework: &str) -> Vec<FrameworkModule> {
    state
        .iter()
        .map(|(identity, groups)| {
            let group = groups
                .iter()
                .find(|g| g.targets(framework))
                .or_else(|| groups.iter().find(|g| g.is_framework_neutral()));

            FrameworkModule {
                identity: identity.clone(),
                group: group.map(|g| g.framework.clone()),
                dependencies: group.map(|g| g.dependencies.clone()).unwrap_or_default(),
            }
        })
        .collect()
}
