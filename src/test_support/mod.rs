//! Test doubles for fleetmod unit tests.
//!
//! Sources that answer from memory (optionally slowly, or not at all) and
//! a lock persistence that lives in memory and can be told to fail.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetmod::test_support::{meta, StaticSource};
//!
//! let source = StaticSource::new("official")
//!     .with_items(vec![meta("Chat", "1.0.0")])
//!     .with_delay(Duration::from_millis(300));
//! ```

pub mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::SearchFilter;
use crate::lock::LockPersistence;
use crate::sources::{ModuleSource, SearchPage, SourceCursor};
use crate::util::Cancelled;

pub use fixtures::*;

/// A source that serves fixed pages, ignoring the search text.
///
/// Page `n` is followed by a cursor `page:{n+1}` while more pages remain.
#[derive(Debug, Default)]
pub struct StaticSource {
    name: String,
    pages: Vec<Vec<crate::core::ModuleSearchMetadata>>,
    delay: Duration,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(name: impl Into<String>) -> Self {
        StaticSource {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a page.
    pub fn with_items(mut self, items: Vec<crate::core::ModuleSearchMetadata>) -> Self {
        self.pages.push(items);
        self
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every request with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of requests served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn page(&self, index: usize, cancel: CancellationToken) -> Result<SearchPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Cancelled.into()),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        if let Some(message) = &self.failure {
            bail!("{message}");
        }

        let items = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor =
            (index + 1 < self.pages.len()).then(|| SourceCursor::new(format!("page:{}", index + 1)));
        Ok(SearchPage::new(items, next_cursor))
    }
}

#[async_trait]
impl ModuleSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        _text: &str,
        _filter: &SearchFilter,
        _page_size: usize,
        cancel: CancellationToken,
    ) -> Result<SearchPage> {
        self.page(0, cancel).await
    }

    async fn continue_search(
        &self,
        cursor: &SourceCursor,
        _page_size: usize,
        cancel: CancellationToken,
    ) -> Result<SearchPage> {
        let Some(index) = cursor
            .as_str()
            .strip_prefix("page:")
            .and_then(|n| n.parse().ok())
        else {
            bail!("unknown cursor `{}`", cursor);
        };
        self.page(index, cancel).await
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    contents: Option<Vec<u8>>,
    saves: usize,
    fail_saves: bool,
}

/// Lock persistence held in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `contents` already stored.
    pub fn with_contents(contents: impl Into<Vec<u8>>) -> Self {
        let persistence = Self::new();
        persistence.state.lock().unwrap().contents = Some(contents.into());
        persistence
    }

    /// Stored bytes, as text.
    pub fn contents(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .contents
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.state.lock().unwrap().saves
    }

    /// Make every following save fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.state.lock().unwrap().fail_saves = fail;
    }
}

#[async_trait]
impl LockPersistence for MemoryPersistence {
    fn location(&self) -> String {
        "<memory>".to_string()
    }

    async fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.state.lock().unwrap().contents.clone())
    }

    async fn save(&self, contents: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_saves {
            bail!("disk full");
        }
        state.contents = Some(contents.to_vec());
        state.saves += 1;
        Ok(())
    }
}
