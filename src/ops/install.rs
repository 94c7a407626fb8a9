//! Implementation of `fleetmod install` and `fleetmod remove`.

use anyhow::{bail, Result};
use semver::Version;
use tokio_util::sync::CancellationToken;

use crate::core::{DependencyGroup, ModuleIdentity, SearchFilter};
use crate::lock::{LockError, ModuleLockStore};
use crate::ops::search::{find_module, search_to_completion, DEFAULT_MAX_REFRESHES};
use crate::search::{AggregatedSearchEngine, LoadingStatus};

/// Receives install events. Notification is fire-and-forget: an error is
/// logged and never undoes the install.
pub trait InstallNotifier: Send + Sync {
    fn module_installed(&self, identity: &ModuleIdentity) -> Result<()>;
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl InstallNotifier for LogNotifier {
    fn module_installed(&self, identity: &ModuleIdentity) -> Result<()> {
        tracing::info!("installed {}", identity.display_name());
        Ok(())
    }
}

/// A module release chosen for installation.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallPlan {
    pub identity: ModuleIdentity,
    pub groups: Vec<DependencyGroup>,
}

/// Record `identity` as installed, then tell `notifier`.
///
/// Installing an already-installed identity replaces its groups.
pub async fn install_module(
    store: &ModuleLockStore,
    identity: ModuleIdentity,
    groups: Vec<DependencyGroup>,
    notifier: &dyn InstallNotifier,
) -> Result<(), LockError> {
    store.add(identity.clone(), groups).await?;

    if let Err(err) = notifier.module_installed(&identity) {
        tracing::warn!(
            "install notification for {} failed: {:#}",
            identity.display_name(),
            err
        );
    }
    Ok(())
}

/// Forget an installed module. Removing one that is not installed succeeds.
pub async fn uninstall_module(
    store: &ModuleLockStore,
    identity: &ModuleIdentity,
) -> Result<(), LockError> {
    store.remove(identity).await?;
    tracing::info!("removed {}", identity.display_name());
    Ok(())
}

/// Find the release to install for `name` across all sources.
///
/// Without `version`, the highest version any source reports is chosen.
/// Dependency groups come from the source metadata, which only describes
/// the newest release; an older pinned version is recorded without groups.
pub async fn resolve_install(
    engine: &AggregatedSearchEngine,
    name: &str,
    version: Option<&Version>,
    filter: &SearchFilter,
    cancel: &CancellationToken,
) -> Result<InstallPlan> {
    let result =
        search_to_completion(engine, name, filter, DEFAULT_MAX_REFRESHES, cancel).await?;

    let Some(found) = find_module(&result, name) else {
        let unanswered: Vec<&str> = result
            .source_status
            .iter()
            .filter(|(_, status)| **status != LoadingStatus::Completed)
            .map(|(source, _)| source.as_str())
            .collect();
        if unanswered.is_empty() {
            bail!("module `{name}` was not found in any source");
        }
        bail!(
            "module `{name}` was not found (no answer from: {})",
            unanswered.join(", ")
        );
    };

    let latest = found
        .versions
        .iter()
        .chain(std::iter::once(found.identity.version()))
        .max()
        .cloned()
        .unwrap_or_else(|| found.identity.version().clone());

    let chosen = match version {
        None => latest,
        Some(requested) => {
            if requested != found.identity.version() && !found.versions.contains(requested) {
                bail!(
                    "version {requested} of `{}` was not found (available: {})",
                    found.name(),
                    found
                        .versions
                        .iter()
                        .map(Version::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            requested.clone()
        }
    };

    let groups = if &chosen == found.identity.version() {
        found.dependency_groups.clone()
    } else {
        tracing::warn!(
            "dependency groups for {} v{} are unknown, recording none",
            found.name(),
            chosen
        );
        Vec::new()
    };

    Ok(InstallPlan {
        identity: ModuleIdentity::new(found.name(), chosen),
        groups,
    })
}
