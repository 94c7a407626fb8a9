//! `fleetmod list` command

use anyhow::Result;
use serde_json::json;

use fleetmod::ops::modules_for_framework;
use fleetmod::util::shell::Shell;
use fleetmod::util::GlobalContext;

use crate::cli::ListArgs;
use crate::commands::lock_store;

pub async fn execute(args: ListArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let store = lock_store(&ctx).await?;
    let modules = store.modules();

    if modules.is_empty() {
        if shell.is_json() {
            shell.json(&json!({ "modules": [] }));
        } else {
            shell.println("No modules installed");
        }
        return Ok(());
    }

    match args.framework {
        None => {
            if shell.is_json() {
                let entries: Vec<_> = modules
                    .iter()
                    .map(|(identity, groups)| json!({ "module": identity, "groups": groups }))
                    .collect();
                shell.json(&json!({ "modules": entries }));
                return Ok(());
            }

            for (identity, groups) in modules.iter() {
                let frameworks: Vec<&str> = groups.iter().map(|g| g.framework.as_str()).collect();
                if frameworks.is_empty() {
                    shell.println(format!("  {}", identity.display_name()));
                } else {
                    shell.println(format!(
                        "  {} [{}]",
                        identity.display_name(),
                        frameworks.join(", ")
                    ));
                }
            }
        }
        Some(framework) => {
            let resolved = modules_for_framework(&modules, &framework);

            if shell.is_json() {
                let entries: Vec<_> = resolved
                    .iter()
                    .map(|m| {
                        json!({
                            "module": m.identity,
                            "group": m.group,
                            "dependencies": m.dependencies,
                        })
                    })
                    .collect();
                shell.json(&json!({ "framework": framework, "modules": entries }));
                return Ok(());
            }

            for module in &resolved {
                shell.println(format!("  {}", module.identity.display_name()));
                for dep in &module.dependencies {
                    shell.println(format!("    {} {}", dep.name, dep.version_req));
                }
            }
        }
    }

    Ok(())
}
