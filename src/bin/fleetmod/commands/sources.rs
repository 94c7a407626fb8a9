//! `fleetmod sources` command

use anyhow::Result;
use serde_json::json;

use fleetmod::util::shell::Shell;
use fleetmod::util::GlobalContext;

pub fn execute(shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let sources = &ctx.config().sources;

    if shell.is_json() {
        shell.json(&json!({ "sources": sources }));
        return Ok(());
    }

    if sources.is_empty() {
        shell.println("No sources configured");
        return Ok(());
    }

    for source in sources {
        let state = if source.enabled { "" } else { " (disabled)" };
        shell.println(format!(
            "  {} [{}] {}{}",
            source.name, source.priority, source.url, state
        ));
    }

    Ok(())
}
