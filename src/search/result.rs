//! Aggregated search results.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::ModuleSearchMetadata;
use crate::search::{ContinuationToken, LoadingStatus, RefreshHandle};

/// The merged outcome of one search call across all sources.
#[derive(Debug, Default)]
pub struct AggregatedSearchResult {
    /// Merged, ranked items
    pub items: Vec<ModuleSearchMetadata>,

    /// Status of every source that took part
    pub source_status: BTreeMap<String, LoadingStatus>,

    /// Errors raised by sources, kept as raised
    pub source_errors: BTreeMap<String, Arc<anyhow::Error>>,

    /// Present when at least one source has more pages
    pub next_token: Option<ContinuationToken>,

    /// Present when at least one source was still running
    pub refresh: Option<RefreshHandle>,

    /// Item count across sources before duplicates were merged
    pub raw_items_count: usize,
}

impl AggregatedSearchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record a status for a source, keeping the more specific one.
    pub(crate) fn record_status(&mut self, source: &str, status: LoadingStatus) {
        self.source_status
            .entry(source.to_string())
            .and_modify(|existing| *existing = existing.merge(status))
            .or_insert(status);
    }

    /// Check whether every source has stopped running.
    pub fn is_complete(&self) -> bool {
        self.refresh.is_none()
    }

    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }

    /// Status for one source.
    pub fn status(&self, source: &str) -> Option<LoadingStatus> {
        self.source_status.get(source).copied()
    }

    /// Sources that reported an error.
    pub fn failed_sources(&self) -> impl Iterator<Item = &str> {
        self.source_errors.keys().map(String::as_str)
    }
}
