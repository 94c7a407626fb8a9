//! Shell output for the fleetmod CLI.
//!
//! All human output goes through `Shell` so commands never format status
//! prefixes themselves:
//! - Status messages right-aligned to a fixed width
//! - A spinner (via indicatif) while waiting on slow sources
//! - JSON mode for machine-readable output, exclusive with human output

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Shell output mode - Human and Json are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

/// Output verbosity level (Human mode only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only, no spinner
    Quiet,
    #[default]
    Normal,
    /// --verbose: debug logging, no spinner
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Status types for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // Success statuses (green)
    Installed,
    Removed,
    Finished,

    // In-progress statuses (cyan)
    Searching,
    Resolving,
    Waiting,

    Info,

    // Warning statuses (yellow)
    Skipped,
    Warning,

    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Installed => "Installed",
            Status::Removed => "Removed",
            Status::Finished => "Finished",
            Status::Searching => "Searching",
            Status::Resolving => "Resolving",
            Status::Waiting => "Waiting",
            Status::Info => "Info",
            Status::Skipped => "Skipped",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Installed | Status::Removed | Status::Finished => "\x1b[1;32m",
            Status::Searching | Status::Resolving | Status::Waiting => "\x1b[1;36m",
            Status::Info => "\x1b[1;34m",
            Status::Skipped | Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
        }
    }
}

const STATUS_WIDTH: usize = 12;

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
}

impl Shell {
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => io::stderr().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };

        Shell { mode, use_color }
    }

    /// Create a shell from CLI flags. JSON takes precedence over quiet/verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice, json: bool) -> Self {
        let mode = if json {
            ShellMode::Json
        } else {
            let verbosity = if quiet {
                Verbosity::Quiet
            } else if verbose {
                Verbosity::Verbose
            } else {
                Verbosity::Normal
            };
            ShellMode::Human { verbosity, color }
        };

        Shell::new(mode)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    /// Print a status message to stderr.
    ///
    /// Format: `{status:>12} {message}`. In quiet mode only errors are
    /// printed; in JSON mode nothing is.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() || (self.is_quiet() && status != Status::Error) {
            return;
        }
        eprintln!("{} {}", self.format_status(status), msg);
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    /// Print a line of regular output to stdout. Ignored in JSON mode.
    pub fn println(&self, msg: impl Display) {
        if !self.is_json() {
            println!("{}", msg);
        }
    }

    /// Print a JSON value to stdout. Ignored in human mode.
    pub fn json(&self, value: &serde_json::Value) {
        if !self.is_json() {
            return;
        }
        println!("{}", serde_json::to_string(value).unwrap_or_default());
        let _ = io::stdout().flush();
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();
        if self.use_color {
            format!("{}{:>width$}\x1b[0m", status.color_code(), text, width = STATUS_WIDTH)
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }

    /// Start a spinner. In quiet, verbose or JSON mode it draws nothing.
    pub fn spinner(&self, msg: impl Display) -> Spinner {
        let pb = if self.is_quiet() || self.is_verbose() || self.is_json() {
            None
        } else {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(style);
            }
            pb.set_message(msg.to_string());
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        };

        Spinner { pb }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

/// A spinner that clears itself when dropped.
pub struct Spinner {
    pb: Option<ProgressBar>,
}

impl Spinner {
    pub fn set_message(&self, msg: impl Display) {
        if let Some(pb) = &self.pb {
            pb.set_message(msg.to_string());
        }
    }

    pub fn is_visible(&self) -> bool {
        self.pb.is_some()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }
}
