//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use fleetmod::util::shell::ColorChoice;

/// fleetmod - search module sources and manage installed modules
#[derive(Parser)]
#[command(name = "fleetmod")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search every configured source for modules
    Search(SearchArgs),

    /// Install a module (records it in the lock file)
    Install(InstallArgs),

    /// Remove an installed module from the lock file
    Remove(RemoveArgs),

    /// List installed modules
    List(ListArgs),

    /// Show installed modules with newer releases
    Outdated(OutdatedArgs),

    /// Show configured sources
    Sources,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search text (empty lists everything)
    #[arg(default_value = "")]
    pub query: String,

    /// Fetch this many additional pages
    #[arg(long, default_value_t = 0)]
    pub more: usize,

    /// Include pre-release versions
    #[arg(long)]
    pub prerelease: bool,

    /// Only modules usable on this framework
    #[arg(long)]
    pub framework: Option<String>,

    /// Give up on slow sources after this many refreshes
    #[arg(long, default_value_t = fleetmod::ops::DEFAULT_MAX_REFRESHES)]
    pub max_refreshes: usize,
}

#[derive(Args)]
pub struct InstallArgs {
    /// Module name
    pub name: String,

    /// Exact version (defaults to the newest)
    #[arg(long)]
    pub version: Option<String>,

    /// Consider pre-release versions
    #[arg(long)]
    pub prerelease: bool,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Module name
    pub name: String,

    /// Installed version
    pub version: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Show the dependencies that apply to this framework
    #[arg(long)]
    pub framework: Option<String>,
}

#[derive(Args)]
pub struct OutdatedArgs {
    /// Consider pre-release versions
    #[arg(long)]
    pub prerelease: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
