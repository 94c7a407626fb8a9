//! Module sources.
//!
//! Sources are responsible for answering searches against a location that
//! holds module metadata (a local index directory or a remote search
//! service). Each one fails and stalls independently of the others.

pub mod cache;
pub mod http;
pub mod index;
pub mod source;

pub use cache::SourceSet;
pub use http::{ClientPool, HttpSource};
pub use index::LocalIndexSource;
pub use source::{ModuleSource, SearchPage, SourceCursor};
