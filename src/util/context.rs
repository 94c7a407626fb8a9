//! Global context for fleetmod operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{self, Config};

/// Default lock file location, relative to the project directory.
pub const DEFAULT_LOCK_PATH: &str = ".fleetmod/modules.lock";

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Merged global + project configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a GlobalContext with a specific working directory.
    ///
    /// Loads the global config (if any) and the project config under `cwd`.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let global = config::global_config_path();
        let config = config::load_config(global.as_deref(), &config::project_config_path(&cwd));

        Ok(GlobalContext { cwd, config })
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the lock file path, resolved against the working directory.
    pub fn lock_path(&self) -> PathBuf {
        match &self.config.lock.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.cwd.join(path),
            None => self.cwd.join(DEFAULT_LOCK_PATH),
        }
    }
}
