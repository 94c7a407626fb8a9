//! Search continuation and refresh handles.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::search::SearchError;
use crate::sources::{SearchPage, SourceCursor};
use crate::util::concurrency::{ObservedTask, TaskOutcome};

/// Loading state of one source within an aggregated search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStatus {
    Loading,
    Completed,
    Cancelled,
    ErrorOccurred,
    Unknown,
}

impl LoadingStatus {
    fn specificity(self) -> u8 {
        match self {
            LoadingStatus::Loading => 0,
            LoadingStatus::Unknown => 1,
            LoadingStatus::Completed => 2,
            LoadingStatus::Cancelled => 3,
            LoadingStatus::ErrorOccurred => 4,
        }
    }

    /// Combine two reports for the same source, keeping the more specific.
    pub fn merge(self, other: LoadingStatus) -> LoadingStatus {
        if other.specificity() > self.specificity() {
            other
        } else {
            self
        }
    }

    /// Whether the source has stopped running.
    pub fn is_terminal(self) -> bool {
        self != LoadingStatus::Loading
    }
}

impl fmt::Display for LoadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadingStatus::Loading => "loading",
            LoadingStatus::Completed => "completed",
            LoadingStatus::Cancelled => "cancelled",
            LoadingStatus::ErrorOccurred => "error",
            LoadingStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Handle for fetching the next page of an aggregated search.
///
/// Holds one cursor per source that still has pages. A source missing from
/// `cursors` is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    pub search_text: String,
    pub cursors: BTreeMap<String, SourceCursor>,
}

impl ContinuationToken {
    /// Encode as an opaque, URL-safe string.
    pub fn encode(&self) -> String {
        // Serializing string maps cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a string produced by `encode`.
    pub fn decode(encoded: &str) -> Result<Self, SearchError> {
        let json = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| SearchError::invalid_token(format!("not a continuation token: {e}")))?;
        serde_json::from_slice(&json)
            .map_err(|e| SearchError::invalid_token(format!("malformed continuation token: {e}")))
    }
}

/// Handle for re-polling a search whose sources had not all answered.
///
/// Owns the still-running per-source tasks, so refreshing waits on the same
/// work instead of dispatching it again.
pub struct RefreshHandle {
    pub(crate) engine_id: u64,
    pub(crate) search_text: String,
    pub(crate) retry_after: Duration,
    pub(crate) pending: BTreeMap<String, ObservedTask<SearchPage>>,
    pub(crate) harvested: BTreeMap<String, TaskOutcome<SearchPage>>,
}

impl RefreshHandle {
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    /// How long to wait before refreshing.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// Sources that were still running when the handle was issued.
    pub fn pending_sources(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(String::as_str)
    }

    /// Check whether every pending source has finished since.
    pub fn is_ready(&self) -> bool {
        self.pending.values().all(ObservedTask::is_finished)
    }
}

impl fmt::Debug for RefreshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("search_text", &self.search_text)
            .field("retry_after", &self.retry_after)
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .field("harvested", &self.harvested.keys().collect::<Vec<_>>())
            .finish()
    }
}
