//! `fleetmod install` command

use anyhow::{Context, Result};
use semver::Version;
use tokio_util::sync::CancellationToken;

use fleetmod::core::{ModuleIdentity, SearchFilter};
use fleetmod::ops::{install_module, resolve_install, InstallNotifier};
use fleetmod::util::shell::{Shell, Status};
use fleetmod::util::GlobalContext;

use crate::cli::InstallArgs;
use crate::commands::{lock_store, search_engine};

/// Reports installs through the shell.
struct ShellNotifier<'a> {
    shell: &'a Shell,
}

impl InstallNotifier for ShellNotifier<'_> {
    fn module_installed(&self, identity: &ModuleIdentity) -> Result<()> {
        self.shell.status(Status::Installed, identity.display_name());
        Ok(())
    }
}

pub async fn execute(args: InstallArgs, shell: &Shell, cancel: &CancellationToken) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let version = args
        .version
        .as_deref()
        .map(Version::parse)
        .transpose()
        .with_context(|| format!("invalid version for `{}`", args.name))?;

    let filter = SearchFilter {
        include_prerelease: args.prerelease || ctx.config().search.include_prerelease(),
        framework: None,
    };

    let engine = search_engine(&ctx)?;
    shell.status(Status::Resolving, &args.name);
    let plan = resolve_install(&engine, &args.name, version.as_ref(), &filter, cancel).await?;

    let store = lock_store(&ctx).await?;
    install_module(&store, plan.identity, plan.groups, &ShellNotifier { shell }).await?;

    Ok(())
}
