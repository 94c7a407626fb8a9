//! Local index source - modules described by manifest files on disk.
//!
//! # Index Structure
//!
//! ```text
//! index/
//! ├── r/
//! │   └── remotedesktop/
//! │       ├── 1.0.0.toml
//! │       └── 1.1.0.toml
//! └── t/
//!     └── tasks/
//!         └── 2.0.0.toml
//! ```
//!
//! # Manifest Format
//!
//! ```toml
//! [module]
//! name = "RemoteDesktop"
//! version = "1.1.0"
//! description = "View and control the remote screen"
//! tags = ["screen", "remote"]
//!
//! [[groups]]
//! framework = "any"
//! dependencies = [{ name = "Tasks.Common", version = "^1.0" }]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::core::{DependencyGroup, ModuleIdentity, ModuleSearchMetadata, SearchFilter};
use crate::sources::source::OffsetCursor;
use crate::sources::{ModuleSource, SearchPage, SourceCursor};
use crate::util::Cancelled;

/// A module manifest file in the index.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexManifest {
    pub module: IndexModule,

    #[serde(default)]
    pub groups: Vec<DependencyGroup>,
}

/// The `[module]` table of a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexModule {
    pub name: String,
    pub version: Version,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub downloads: Option<u64>,
}

/// Get the manifest path for a module release inside an index.
pub fn manifest_path(index: &Path, name: &str, version: &Version) -> PathBuf {
    let lower = name.to_ascii_lowercase();
    let letter = lower.chars().next().unwrap_or('_').to_string();
    index
        .join(letter)
        .join(&lower)
        .join(format!("{}.toml", version))
}

/// A source backed by a local index directory.
pub struct LocalIndexSource {
    name: String,
    root: PathBuf,
}

impl LocalIndexSource {
    /// Create a source over the index rooted at `root`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        LocalIndexSource {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Get the index root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn page(
        &self,
        cursor: OffsetCursor,
        page_size: usize,
        cancel: CancellationToken,
    ) -> Result<SearchPage> {
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }

        let root = self.root.clone();
        let text = cursor.text.clone();
        let filter = cursor.filter.clone();
        let scan = tokio::task::spawn_blocking(move || scan_index(&root, &text, &filter));

        let matches = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled.into()),
            joined = scan => joined.context("index scan task failed")??,
        };

        tracing::debug!(
            "index `{}` matched {} modules for `{}`",
            self.name,
            matches.len(),
            cursor.text
        );

        let page_size = page_size.max(1);
        let items: Vec<_> = matches
            .iter()
            .skip(cursor.offset)
            .take(page_size)
            .cloned()
            .collect();

        let next_offset = cursor.offset + items.len();
        let next_cursor = if !items.is_empty() && next_offset < matches.len() {
            Some(
                OffsetCursor {
                    offset: next_offset,
                    ..cursor
                }
                .encode()?,
            )
        } else {
            None
        };

        Ok(SearchPage::new(items, next_cursor))
    }
}

#[async_trait]
impl ModuleSource for LocalIndexSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        text: &str,
        filter: &SearchFilter,
        page_size: usize,
        cancel: CancellationToken,
    ) -> Result<SearchPage> {
        let cursor = OffsetCursor {
            text: text.to_string(),
            filter: filter.clone(),
            offset: 0,
        };
        self.page(cursor, page_size, cancel).await
    }

    async fn continue_search(
        &self,
        cursor: &SourceCursor,
        page_size: usize,
        cancel: CancellationToken,
    ) -> Result<SearchPage> {
        let cursor = OffsetCursor::decode(cursor)?;
        self.page(cursor, page_size, cancel).await
    }
}

/// Scan the index and return matching modules sorted by name.
///
/// Each module is reported once, at its newest accepted version, with every
/// accepted version listed newest first.
fn scan_index(root: &Path, text: &str, filter: &SearchFilter) -> Result<Vec<ModuleSearchMetadata>> {
    if !root.is_dir() {
        anyhow::bail!("module index not found at: {}", root.display());
    }

    let mut releases: BTreeMap<String, Vec<IndexManifest>> = BTreeMap::new();

    for entry in WalkDir::new(root).min_depth(3).max_depth(3) {
        let entry = entry.with_context(|| format!("failed to read index: {}", root.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "toml") {
            continue;
        }

        let manifest = match load_manifest(path) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!("skipping index entry {}: {:#}", path.display(), e);
                continue;
            }
        };

        if !filter.accepts_version(&manifest.module.version)
            || !filter.accepts_groups(&manifest.groups)
        {
            continue;
        }

        releases
            .entry(manifest.module.name.to_ascii_lowercase())
            .or_default()
            .push(manifest);
    }

    let terms: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();

    let mut results: Vec<ModuleSearchMetadata> = releases
        .into_values()
        .filter_map(|mut manifests| {
            manifests.sort_by(|a, b| b.module.version.cmp(&a.module.version));
            let versions: Vec<Version> = manifests.iter().map(|m| m.module.version.clone()).collect();
            let latest = manifests.into_iter().next()?;
            let mut metadata = to_metadata(latest);
            metadata.versions = versions;
            Some(metadata)
        })
        .filter(|metadata| matches_terms(metadata, &terms))
        .collect();

    results.sort_by(|a, b| a.identity.cmp(&b.identity));
    Ok(results)
}

fn load_manifest(path: &Path) -> Result<IndexManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse manifest: {}", path.display()))
}

fn to_metadata(manifest: IndexManifest) -> ModuleSearchMetadata {
    let IndexManifest { module, groups } = manifest;
    let mut metadata = ModuleSearchMetadata::new(ModuleIdentity::new(module.name, module.version))
        .with_description(module.description)
        .with_authors(module.authors)
        .with_tags(module.tags)
        .with_dependency_groups(groups);
    metadata.title = module.title;
    metadata.download_count = module.downloads;
    metadata
}

/// Every term must appear in the name, title, description or tags.
fn matches_terms(metadata: &ModuleSearchMetadata, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }

    let haystack = format!(
        "{} {} {} {}",
        metadata.name(),
        metadata.title.as_deref().unwrap_or_default(),
        metadata.description,
        metadata.tags.join(" ")
    )
    .to_lowercase();

    terms.iter().all(|term| haystack.contains(term.as_str()))
}
