//! fleetmod - module distribution and aggregated search for fleet administration
//!
//! This crate provides the core library functionality for fleetmod:
//! searching many module sources at once, tracking installed modules in a
//! lock file, and the bounded task execution both are built on.

pub mod core;
pub mod lock;
pub mod ops;
pub mod search;
pub mod sources;
pub mod util;

/// Test doubles for fleetmod unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides in-memory sources and lock persistence.
#[cfg(test)]
pub mod test_support;

pub use core::{DependencyGroup, ModuleDependency, ModuleIdentity, ModuleSearchMetadata, SearchFilter};
pub use lock::{LockError, ModuleLockStore};
pub use search::{AggregatedSearchEngine, AggregatedSearchResult, ContinuationToken, SearchError};
pub use sources::{ModuleSource, SourceSet};
pub use util::context::GlobalContext;
