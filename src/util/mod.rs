//! Shared utilities

pub mod concurrency;
pub mod config;
pub mod context;
pub mod fs;
pub mod hash;
pub mod shell;

pub use concurrency::{Cancelled, ConcurrencyError, MAX_DEGREE_OF_PARALLELISM};
pub use config::Config;
pub use context::GlobalContext;
