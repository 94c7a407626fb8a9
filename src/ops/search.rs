//! Searching until every source has answered.

use tokio_util::sync::CancellationToken;

use crate::core::{ModuleSearchMetadata, SearchFilter};
use crate::search::{AggregatedSearchEngine, AggregatedSearchResult, SearchError};

/// Default number of refreshes before giving up on slow sources.
pub const DEFAULT_MAX_REFRESHES: usize = 6;

/// Search and keep refreshing until all sources finish or `max_refreshes`
/// refreshes have been spent.
///
/// A result that still carries a refresh handle after the last refresh is
/// returned as is; its status map shows which sources never answered.
pub async fn search_to_completion(
    engine: &AggregatedSearchEngine,
    text: &str,
    filter: &SearchFilter,
    max_refreshes: usize,
    cancel: &CancellationToken,
) -> Result<AggregatedSearchResult, SearchError> {
    let mut result = engine.search(text, filter, cancel).await?;

    for _ in 0..max_refreshes {
        let Some(handle) = result.refresh.take() else {
            break;
        };
        result = engine.refresh(handle, cancel).await?;
    }

    Ok(result)
}

/// Find the entry for `name` (case-insensitive) in a result.
pub fn find_module<'a>(
    result: &'a AggregatedSearchResult,
    name: &str,
) -> Option<&'a ModuleSearchMetadata> {
    result.items.iter().find(|item| item.identity.is_named(name))
}
