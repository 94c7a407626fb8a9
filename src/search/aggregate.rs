//! The aggregated search engine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::SearchFilter;
use crate::search::merge::merge_pages;
use crate::search::{
    AggregatedSearchResult, ContinuationToken, LoadingStatus, RefreshHandle, SearchError,
};
use crate::sources::{ModuleSource, SearchPage, SourceCursor, SourceSet};
use crate::util::concurrency::{drain_until, fan_out_observed, ObservedTask, TaskOutcome};

/// How long a search waits for sources before returning what it has.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Items requested from each source per page.
pub const DEFAULT_PAGE_SIZE: usize = 25;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Searches every configured source at once and merges the answers.
///
/// A call returns when every source has answered or the timeout elapses,
/// whichever is first. Sources still running at that point keep running;
/// the result carries a `RefreshHandle` for collecting them later.
pub struct AggregatedSearchEngine {
    sources: SourceSet,
    timeout: Duration,
    page_size: usize,
    id: u64,
}

impl AggregatedSearchEngine {
    pub fn new(sources: SourceSet) -> Self {
        AggregatedSearchEngine {
            sources,
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check whether results from more than one source are merged.
    pub fn is_multi_source(&self) -> bool {
        self.sources.len() > 1
    }

    /// Start a search on every source.
    pub async fn search(
        &self,
        search_text: &str,
        filter: &SearchFilter,
        cancel: &CancellationToken,
    ) -> Result<AggregatedSearchResult, SearchError> {
        tracing::debug!(
            "searching {} sources for `{}`",
            self.sources.len(),
            search_text
        );

        let text = search_text.to_string();
        let filter = filter.clone();
        let page_size = self.page_size;

        let tasks = fan_out_observed(
            self.sources.iter().cloned(),
            |source| source.name().to_string(),
            move |source: Arc<dyn ModuleSource>, token| {
                let text = text.clone();
                let filter = filter.clone();
                async move { source.search(&text, &filter, page_size, token).await }
            },
            log_source_fault,
            cancel,
        )?;

        self.wait_for_completion_or_bail_out(search_text, tasks, BTreeMap::new(), cancel)
            .await
    }

    /// Fetch the next page of a search.
    ///
    /// Only sources that are both named in the token and still configured
    /// are asked; the others are dropped.
    pub async fn continue_search(
        &self,
        token: &ContinuationToken,
        cancel: &CancellationToken,
    ) -> Result<AggregatedSearchResult, SearchError> {
        for name in token.cursors.keys() {
            if self.sources.get(name).is_none() {
                tracing::debug!("dropping cursor for unconfigured source `{}`", name);
            }
        }

        let work: Vec<(Arc<dyn ModuleSource>, SourceCursor)> = self
            .sources
            .iter()
            .filter_map(|source| {
                token
                    .cursors
                    .get(source.name())
                    .map(|cursor| (Arc::clone(source), cursor.clone()))
            })
            .collect();

        let page_size = self.page_size;
        let tasks = fan_out_observed(
            work,
            |(source, _)| source.name().to_string(),
            move |(source, cursor), cancel| async move {
                source.continue_search(&cursor, page_size, cancel).await
            },
            log_source_fault,
            cancel,
        )?;

        self.wait_for_completion_or_bail_out(&token.search_text, tasks, BTreeMap::new(), cancel)
            .await
    }

    /// Decode `encoded` and continue the search it describes.
    pub async fn continue_search_encoded(
        &self,
        encoded: &str,
        cancel: &CancellationToken,
    ) -> Result<AggregatedSearchResult, SearchError> {
        let token = ContinuationToken::decode(encoded)?;
        self.continue_search(&token, cancel).await
    }

    /// Wait again on the sources a previous result was still waiting for.
    ///
    /// The result covers every source of the original search, not just the
    /// ones that finished since.
    pub async fn refresh(
        &self,
        handle: RefreshHandle,
        cancel: &CancellationToken,
    ) -> Result<AggregatedSearchResult, SearchError> {
        if handle.engine_id != self.id {
            return Err(SearchError::invalid_token(
                "refresh handle was issued by a different search engine",
            ));
        }

        let RefreshHandle {
            search_text,
            pending,
            harvested,
            ..
        } = handle;
        self.wait_for_completion_or_bail_out(&search_text, pending, harvested, cancel)
            .await
    }

    /// Wait up to the timeout for `pending`, then merge everything harvested.
    async fn wait_for_completion_or_bail_out(
        &self,
        search_text: &str,
        mut pending: BTreeMap<String, ObservedTask<SearchPage>>,
        mut harvested: BTreeMap<String, TaskOutcome<SearchPage>>,
        cancel: &CancellationToken,
    ) -> Result<AggregatedSearchResult, SearchError> {
        if pending.is_empty() && harvested.is_empty() {
            return Ok(AggregatedSearchResult::empty());
        }

        let finished = drain_until(&mut pending, self.timeout, cancel).await?;
        harvested.extend(finished);

        // Pages in source priority order, so ties in ranking follow it.
        let mut pages = Vec::new();
        let mut cursors = BTreeMap::new();
        for source in self.sources.iter() {
            if let Some(TaskOutcome::Completed(page)) = harvested.get(source.name()) {
                pages.push((source.name().to_string(), page.items.clone()));
                if let Some(cursor) = &page.next_cursor {
                    cursors.insert(source.name().to_string(), cursor.clone());
                }
            }
        }

        let merged = merge_pages(search_text, pages);
        let mut result = AggregatedSearchResult {
            items: merged.items,
            raw_items_count: merged.raw_items_count,
            ..AggregatedSearchResult::empty()
        };

        for (source, outcome) in &harvested {
            let status = match outcome {
                TaskOutcome::Completed(_) => LoadingStatus::Completed,
                TaskOutcome::Cancelled => LoadingStatus::Cancelled,
                TaskOutcome::Faulted(err) => {
                    result.source_errors.insert(source.clone(), Arc::clone(err));
                    LoadingStatus::ErrorOccurred
                }
                TaskOutcome::Unknown => LoadingStatus::Unknown,
            };
            result.record_status(source, status);
        }
        for source in pending.keys() {
            result.record_status(source, LoadingStatus::Loading);
        }

        if !cursors.is_empty() {
            result.next_token = Some(ContinuationToken {
                search_text: search_text.to_string(),
                cursors,
            });
        }

        if pending.is_empty() {
            tracing::debug!(
                "search for `{}` complete: {} items from {} sources",
                search_text,
                result.items.len(),
                harvested.len()
            );
        } else {
            tracing::debug!(
                "search for `{}` still waiting on {} sources",
                search_text,
                pending.len()
            );
            result.refresh = Some(RefreshHandle {
                engine_id: self.id,
                search_text: search_text.to_string(),
                retry_after: self.timeout,
                pending,
                harvested,
            });
        }

        Ok(result)
    }
}

fn log_source_fault(source: &String, err: &anyhow::Error) {
    tracing::warn!("source `{}` failed: {:#}", source, err);
}
