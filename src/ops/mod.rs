//! High-level operations.
//!
//! This module contains the implementation of fleetmod commands.

pub mod install;
pub mod outdated;
pub mod query;
pub mod search;

pub use install::{
    install_module, resolve_install, uninstall_module, InstallNotifier, InstallPlan, LogNotifier,
};
pub use outdated::{check_updates, ModuleUpdate};
pub use query::{modules_for_framework, FrameworkModule};
pub use search::{find_module, search_to_completion, DEFAULT_MAX_REFRESHES};
