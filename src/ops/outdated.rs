//! Implementation of `fleetmod outdated`.

use std::sync::Arc;

use anyhow::Result;
use semver::Version;
use tokio_util::sync::CancellationToken;

use crate::core::{ModuleIdentity, SearchFilter};
use crate::lock::ModuleLockState;
use crate::ops::search::{find_module, search_to_completion, DEFAULT_MAX_REFRESHES};
use crate::search::AggregatedSearchEngine;
use crate::util::concurrency::run_throttled;

/// A locked module with a newer release available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleUpdate {
    pub current: ModuleIdentity,
    pub latest: Version,
}

/// Look up every locked module and report those with a newer release.
///
/// At most `max_parallelism` lookups run at once. A module no source
/// knows about is skipped. Results are sorted by module.
pub async fn check_updates(
    engine: Arc<AggregatedSearchEngine>,
    state: &ModuleLockState,
    filter: SearchFilter,
    max_parallelism: usize,
    cancel: &CancellationToken,
) -> Result<Vec<ModuleUpdate>> {
    let filter = Arc::new(filter);
    let installed: Vec<ModuleIdentity> = state.keys().cloned().collect();
    tracing::debug!("checking {} modules for updates", installed.len());

    let found = run_throttled(
        installed,
        move |identity: ModuleIdentity, cancel| {
            let engine = Arc::clone(&engine);
            let filter = Arc::clone(&filter);
            async move {
                let result = search_to_completion(
                    &engine,
                    identity.name(),
                    &filter,
                    DEFAULT_MAX_REFRESHES,
                    &cancel,
                )
                .await?;

                let latest = find_module(&result, identity.name())
                    .and_then(|m| m.versions.iter().chain([m.identity.version()]).max().cloned());

                Ok(match latest {
                    Some(latest) if &latest > identity.version() => Some(ModuleUpdate {
                        current: identity,
                        latest,
                    }),
                    Some(_) => None,
                    None => {
                        tracing::debug!("no source knows {}", identity.name());
                        None
                    }
                })
            }
        },
        max_parallelism,
        cancel,
    )
    .await?;

    let mut updates: Vec<ModuleUpdate> = found.into_iter().flatten().collect();
    updates.sort_by(|a, b| a.current.cmp(&b.current));
    Ok(updates)
}
