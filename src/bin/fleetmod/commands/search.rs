//! `fleetmod search` command

use anyhow::Result;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use fleetmod::core::{ModuleSearchMetadata, SearchFilter};
use fleetmod::search::{AggregatedSearchEngine, AggregatedSearchResult, LoadingStatus};
use fleetmod::util::shell::{Shell, Status};
use fleetmod::util::GlobalContext;

use crate::cli::SearchArgs;
use crate::commands::search_engine;

pub async fn execute(args: SearchArgs, shell: &Shell, cancel: &CancellationToken) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let engine = search_engine(&ctx)?;

    let filter = SearchFilter {
        include_prerelease: args.prerelease || ctx.config().search.include_prerelease(),
        framework: args.framework.clone(),
    };

    shell.status(
        Status::Searching,
        format!(
            "`{}` across {} source{}",
            args.query,
            engine.sources().len(),
            if engine.sources().len() == 1 { "" } else { "s" }
        ),
    );

    let first = engine.search(&args.query, &filter, cancel).await?;
    let mut page = settle(&engine, first, args.max_refreshes, shell, cancel).await?;
    report(shell, &args.query, &page, 0);

    for number in 1..=args.more {
        let Some(token) = page.next_token.take() else {
            break;
        };
        let next = engine.continue_search(&token, cancel).await?;
        page = settle(&engine, next, args.max_refreshes, shell, cancel).await?;
        report(shell, &args.query, &page, number);
    }

    if page.has_more() && !shell.is_json() {
        shell.note("more results available (use --more)");
    }

    Ok(())
}

/// Refresh a result until every source has answered or the budget is spent.
async fn settle(
    engine: &AggregatedSearchEngine,
    mut result: AggregatedSearchResult,
    max_refreshes: usize,
    shell: &Shell,
    cancel: &CancellationToken,
) -> Result<AggregatedSearchResult> {
    let mut refreshes = 0;
    while refreshes < max_refreshes {
        let Some(handle) = result.refresh.take() else {
            break;
        };

        let waiting: Vec<&str> = handle.pending_sources().collect();
        let spinner = shell.spinner(format!("waiting for {}", waiting.join(", ")));
        if !spinner.is_visible() {
            shell.status(Status::Waiting, waiting.join(", "));
        }

        result = engine.refresh(handle, cancel).await?;
        refreshes += 1;
    }
    Ok(result)
}

fn report(shell: &Shell, query: &str, result: &AggregatedSearchResult, page: usize) {
    if shell.is_json() {
        shell.json(&json!({
            "query": query,
            "page": page,
            "items": result.items,
            "raw_items_count": result.raw_items_count,
            "sources": result.source_status,
            "errors": result
                .source_errors
                .iter()
                .map(|(source, err)| (source.clone(), format!("{err:#}")))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "next_token": result.next_token.as_ref().map(|t| t.encode()),
        }));
        return;
    }

    for (source, status) in &result.source_status {
        match status {
            LoadingStatus::Completed => {}
            LoadingStatus::ErrorOccurred => {
                let reason = result
                    .source_errors
                    .get(source)
                    .map(|err| format!("{err:#}"))
                    .unwrap_or_default();
                shell.warn(format!("source `{source}` failed: {reason}"));
            }
            other => shell.warn(format!("source `{source}` {other}")),
        }
    }

    if result.items.is_empty() {
        if page == 0 {
            shell.println(format!("No modules found matching '{}'", query));
        }
        return;
    }

    if page == 0 {
        shell.println(format!(
            "Found {} module{} matching '{}':\n",
            result.items.len(),
            if result.items.len() == 1 { "" } else { "s" },
            query
        ));
    }

    for item in &result.items {
        shell.println(format_item(item));
    }
}

fn format_item(item: &ModuleSearchMetadata) -> String {
    let mut line = format!("  {} v{}", item.name(), item.identity.version());
    if let Some(title) = &item.title {
        line.push_str(&format!(" ({title})"));
    }
    if !item.description.is_empty() {
        line.push_str(&format!(" - {}", item.description));
    }
    if let Some(downloads) = item.download_count {
        line.push_str(&format!(" [{downloads} downloads]"));
    }
    line
}
