//! Core data structures for fleetmod.
//!
//! This module contains the foundational types used throughout fleetmod:
//! - Module identities (name + semantic version)
//! - Dependency groups per target framework
//! - Search metadata and filters

pub mod dependency;
pub mod metadata;
pub mod module_id;

pub use dependency::{DependencyGroup, ModuleDependency, ANY_FRAMEWORK};
pub use metadata::{ModuleSearchMetadata, SearchFilter};
pub use module_id::ModuleIdentity;
