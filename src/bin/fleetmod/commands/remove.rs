//! `fleetmod remove` command

use anyhow::{Context, Result};

use fleetmod::core::ModuleIdentity;
use fleetmod::ops::uninstall_module;
use fleetmod::util::shell::{Shell, Status};
use fleetmod::util::GlobalContext;

use crate::cli::RemoveArgs;
use crate::commands::lock_store;

pub async fn execute(args: RemoveArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let identity = ModuleIdentity::parse(args.name.as_str(), &args.version)
        .with_context(|| format!("invalid version `{}`", args.version))?;

    let store = lock_store(&ctx).await?;
    if !store.contains(&identity) {
        shell.status(
            Status::Skipped,
            format!("{} is not installed", identity.display_name()),
        );
        return Ok(());
    }

    uninstall_module(&store, &identity).await?;
    shell.status(Status::Removed, identity.display_name());

    Ok(())
}
