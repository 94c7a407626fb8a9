//! HTTP source - modules from a remote search service.
//!
//! The service follows the NuGet v3 search query shape:
//!
//! ```text
//! GET {endpoint}?q=remote&skip=0&take=25&prerelease=false&semVerLevel=2.0.0
//!
//! { "totalHits": 2, "data": [ { "id": "RemoteDesktop", "version": "1.1.0", ... } ] }
//! ```
//!
//! Hits may carry `dependencyGroups` in the NuGet registration shape
//! (`targetFramework` plus `dependencies` of `{ id, range }`, ranges in semver
//! requirement syntax). Services that
//! leave it out report no groups, and modules installed from them are
//! recorded without dependencies.
//!
//! Every `HttpSource` is bound to one endpoint when it is created. Clients
//! are shared per endpoint origin through a `ClientPool`, so concurrent
//! searches against different endpoints never touch each other's state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::{
    DependencyGroup, ModuleDependency, ModuleIdentity, ModuleSearchMetadata, SearchFilter,
};
use crate::sources::source::OffsetCursor;
use crate::sources::{ModuleSource, SearchPage, SourceCursor};
use crate::util::Cancelled;

const USER_AGENT: &str = concat!("fleetmod/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reuses one HTTP client per endpoint origin.
#[derive(Debug, Clone, Default)]
pub struct ClientPool {
    clients: Arc<Mutex<HashMap<String, reqwest::Client>>>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the client for an endpoint, creating it on first use.
    pub fn client_for(&self, endpoint: &Url) -> Result<reqwest::Client> {
        let origin = endpoint.origin().ascii_serialization();
        let mut clients = match self.clients.lock() {
            Ok(clients) => clients,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(client) = clients.get(&origin) {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        clients.insert(origin, client.clone());
        Ok(client)
    }

    /// Number of distinct origins with a live client.
    pub fn len(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Search service response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    total_hits: usize,

    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    id: String,
    version: String,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    authors: OneOrMany,

    #[serde(default)]
    tags: OneOrMany,

    #[serde(default)]
    total_downloads: Option<u64>,

    #[serde(default)]
    versions: Vec<HitVersion>,

    #[serde(default)]
    dependency_groups: Vec<HitGroup>,
}

#[derive(Debug, Deserialize)]
struct HitVersion {
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HitGroup {
    #[serde(default)]
    target_framework: String,

    #[serde(default)]
    dependencies: Vec<HitDependency>,
}

#[derive(Debug, Deserialize)]
struct HitDependency {
    id: String,

    #[serde(default)]
    range: Option<String>,
}

/// Services send either a single string or a list.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::None => Vec::new(),
            OneOrMany::One(s) => s
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            OneOrMany::Many(v) => v,
        }
    }
}

/// A source backed by a remote search endpoint.
pub struct HttpSource {
    name: String,
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpSource {
    /// Create a source bound to `endpoint`.
    pub fn new(name: impl Into<String>, endpoint: Url, client: reqwest::Client) -> Self {
        HttpSource {
            name: name.into(),
            endpoint,
            client,
        }
    }

    /// Create a source using a client from `pool`.
    pub fn from_pool(name: impl Into<String>, endpoint: Url, pool: &ClientPool) -> Result<Self> {
        let client = pool.client_for(&endpoint)?;
        Ok(Self::new(name, endpoint, client))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_url(&self, cursor: &OffsetCursor, page_size: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", &cursor.text)
            .append_pair("skip", &cursor.offset.to_string())
            .append_pair("take", &page_size.to_string())
            .append_pair("prerelease", &cursor.filter.include_prerelease.to_string())
            .append_pair("semVerLevel", "2.0.0");
        url
    }

    async fn page(
        &self,
        cursor: OffsetCursor,
        page_size: usize,
        cancel: CancellationToken,
    ) -> Result<SearchPage> {
        let page_size = page_size.max(1);
        let url = self.request_url(&cursor, page_size);
        tracing::debug!("querying `{}`: {}", self.name, url);

        let fetch = async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .with_context(|| format!("request to {} failed", self.endpoint))?
                .error_for_status()
                .with_context(|| format!("{} returned an error status", self.endpoint))?;

            response
                .json::<SearchResponse>()
                .await
                .with_context(|| format!("malformed search response from {}", self.endpoint))
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled.into()),
            response = fetch => response?,
        };

        page_from_response(&self.name, response, cursor)
    }
}

#[async_trait]
impl ModuleSource for HttpSource {
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

fn page_from_response(
    source: &str,
    response: SearchResponse,
    cursor: OffsetCursor,
) -> Result<SearchPage> {
    let received = response.data.len();

    let items: Vec<ModuleSearchMetadata> = response
        .data
        .into_iter()
        .filter_map(|hit| match hit_to_metadata(hit) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!("`{}` returned an unusable entry: {:#}", source, e);
                None
            }
        })
        .filter(|metadata| cursor.filter.accepts_version(metadata.identity.version()))
        .filter(|metadata| cursor.filter.accepts_groups(&metadata.dependency_groups))
        .collect();

    let next_offset = cursor.offset + received;
    let next_cursor = if received > 0 && next_offset < response.total_hits {
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

fn hit_to_metadata(hit: SearchHit) -> Result<ModuleSearchMetadata> {
    let version = Version::parse(&hit.version)
        .with_context(|| format!("invalid version `{}` for `{}`", hit.version, hit.id))?;

    let mut versions: Vec<Version> = hit
        .versions
        .iter()
        .filter_map(|v| Version::parse(&v.version).ok())
        .collect();
    if versions.is_empty() {
        versions.push(version.clone());
    }
    versions.sort_by(|a, b| b.cmp(a));

    let groups = hit
        .dependency_groups
        .into_iter()
        .map(|group| -> Result<DependencyGroup> {
            let dependencies = group
                .dependencies
                .into_iter()
                .map(|dep| {
                    let range = dep.range.as_deref().unwrap_or("*");
                    ModuleDependency::parse(dep.id.as_str(), range).with_context(|| {
                        format!("invalid range `{}` for dependency `{}`", range, dep.id)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(DependencyGroup::new(group.target_framework, dependencies))
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("bad dependency groups for `{}`", hit.id))?;

    let mut metadata = ModuleSearchMetadata::new(ModuleIdentity::new(hit.id, version))
        .with_description(hit.description.unwrap_or_default())
        .with_authors(hit.authors.into_vec())
        .with_tags(hit.tags.into_vec())
        .with_dependency_groups(groups);
    metadata.title = hit.title.filter(|t| !t.is_empty());
    metadata.download_count = hit.total_downloads;
    metadata.versions = versions;
    Ok(metadata)
}
