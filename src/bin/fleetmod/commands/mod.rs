//! Command implementations.

pub mod completions;
pub mod install;
pub mod list;
pub mod outdated;
pub mod remove;
pub mod search;
pub mod sources;

use anyhow::{bail, Result};

use fleetmod::lock::{FileLockPersistence, ModuleLockStore};
use fleetmod::search::AggregatedSearchEngine;
use fleetmod::sources::{ClientPool, SourceSet};
use fleetmod::util::GlobalContext;

/// Build the search engine for the configured sources.
pub fn search_engine(ctx: &GlobalContext) -> Result<AggregatedSearchEngine> {
    let config = ctx.config();
    let sources = SourceSet::from_config(config, ctx.cwd(), &ClientPool::new())?;
    if sources.is_empty() {
        bail!(
            "no module sources are configured\n\
             hint: add a [[sources]] entry to .fleetmod/config.toml"
        );
    }

    Ok(AggregatedSearchEngine::new(sources)
        .with_timeout(config.search.timeout())
        .with_page_size(config.search.page_size()))
}

/// Open the project's lock store.
pub async fn lock_store(ctx: &GlobalContext) -> Result<ModuleLockStore> {
    let store = ModuleLockStore::open(FileLockPersistence::new(ctx.lock_path())).await?;
    Ok(store)
}
