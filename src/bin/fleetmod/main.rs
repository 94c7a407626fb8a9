//! fleetmod CLI - module search and install tracking

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use fleetmod::util::shell::Shell;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("fleetmod=debug")
    } else if cli.quiet {
        EnvFilter::new("fleetmod=error")
    } else {
        EnvFilter::new("fleetmod=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color, cli.json);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        match cli.command {
            Commands::Search(args) => commands::search::execute(args, &shell, &cancel).await,
            Commands::Install(args) => commands::install::execute(args, &shell, &cancel).await,
            Commands::Remove(args) => commands::remove::execute(args, &shell).await,
            Commands::List(args) => commands::list::execute(args, &shell).await,
            Commands::Outdated(args) => commands::outdated::execute(args, &shell, &cancel).await,
            Commands::Sources => commands::sources::execute(&shell),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    })
}
