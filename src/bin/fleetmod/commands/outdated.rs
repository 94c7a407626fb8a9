//! `fleetmod outdated` command

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use fleetmod::core::SearchFilter;
use fleetmod::ops::check_updates;
use fleetmod::util::shell::Shell;
use fleetmod::util::GlobalContext;

use crate::cli::OutdatedArgs;
use crate::commands::{lock_store, search_engine};

pub async fn execute(args: OutdatedArgs, shell: &Shell, cancel: &CancellationToken) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let store = lock_store(&ctx).await?;
    let installed = store.modules();

    if installed.is_empty() {
        shell.println("No modules installed");
        return Ok(());
    }

    let engine = Arc::new(search_engine(&ctx)?);
    let filter = SearchFilter {
        include_prerelease: args.prerelease || ctx.config().search.include_prerelease(),
        framework: None,
    };

    let spinner = shell.spinner(format!("checking {} modules", installed.len()));
    let updates = check_updates(
        engine,
        &installed,
        filter,
        ctx.config().search.max_parallelism(),
        cancel,
    )
    .await?;
    drop(spinner);

    if shell.is_json() {
        let entries: Vec<_> = updates
            .iter()
            .map(|u| json!({ "module": u.current, "latest": u.latest.to_string() }))
            .collect();
        shell.json(&json!({ "updates": entries }));
        return Ok(());
    }

    if updates.is_empty() {
        shell.println("All modules are up to date");
        return Ok(());
    }

    for update in &updates {
        shell.println(format!(
            "  {} v{} -> v{}",
            update.current.name(),
            update.current.version(),
            update.latest
        ));
    }

    Ok(())
}
