//! Aggregated search across module sources.
//!
//! One search fans out to every source, waits a bounded time, and merges
//! whatever came back. Slow sources are never waited on past the timeout
//! and failing sources never fail the search.

pub mod aggregate;
pub mod errors;
pub mod merge;
pub mod result;
pub mod token;

pub use aggregate::{AggregatedSearchEngine, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT};
pub use errors::SearchError;
pub use result::AggregatedSearchResult;
pub use token::{ContinuationToken, LoadingStatus, RefreshHandle};
