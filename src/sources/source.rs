//! ModuleSource trait - common interface for all module sources.

use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::{ModuleSearchMetadata, SearchFilter};

/// Opaque per-source continuation cursor.
///
/// Only the source that issued a cursor knows how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceCursor(String);

impl SourceCursor {
    pub fn new(value: impl Into<String>) -> Self {
        SourceCursor(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Offset-based cursor shared by the bundled sources.
///
/// Carries the original query so a follow-up page can be fetched without
/// the caller resubmitting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct OffsetCursor {
    pub text: String,
    pub filter: SearchFilter,
    pub offset: usize,
}

impl OffsetCursor {
    pub fn encode(&self) -> Result<SourceCursor> {
        let json = serde_json::to_vec(self)?;
        Ok(SourceCursor(URL_SAFE_NO_PAD.encode(json)))
    }

    pub fn decode(cursor: &SourceCursor) -> Result<Self> {
        let json = URL_SAFE_NO_PAD
            .decode(cursor.as_str())
            .with_context(|| format!("malformed cursor `{}`", cursor))?;
        serde_json::from_slice(&json).with_context(|| format!("malformed cursor `{}`", cursor))
    }
}

/// One page of results from a single source.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<ModuleSearchMetadata>,

    /// Cursor for the next page; `None` when the source is exhausted
    pub next_cursor: Option<SourceCursor>,
}

impl SearchPage {
    pub fn new(items: Vec<ModuleSearchMetadata>, next_cursor: Option<SourceCursor>) -> Self {
        SearchPage { items, next_cursor }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A searchable origin of module metadata.
///
/// Implementations must honor `cancel`: once it fires, outstanding I/O
/// should stop at the next suspension point.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Get the source name. Names are unique across a configuration.
    fn name(&self) -> &str;

    /// Fetch the first page of results for `text`.
    async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        page_size: usize,
        cancel: CancellationToken,
    ) -> Result<SearchPage>;

    /// Fetch the page a previous call pointed to.
    async fn continue_search(
        &self,
        cursor: &SourceCursor,
        page_size: usize,
        cancel: CancellationToken,
    ) -> Result<SearchPage>;
}
