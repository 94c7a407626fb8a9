//! The set of configured sources.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::sources::{ClientPool, HttpSource, LocalIndexSource, ModuleSource};
use crate::util::config::{Config, SourceEntry};

/// All enabled module sources, in priority order.
#[derive(Clone, Default)]
pub struct SourceSet {
    sources: Vec<Arc<dyn ModuleSource>>,
}

impl SourceSet {
    /// Create a source set from already-built sources.
    pub fn new(sources: Vec<Arc<dyn ModuleSource>>) -> Self {
        SourceSet { sources }
    }

    /// Build every enabled source in `config`.
    ///
    /// Relative index paths are resolved against `cwd`. HTTP sources get
    /// their client from `pool`.
    pub fn from_config(config: &Config, cwd: &Path, pool: &ClientPool) -> Result<Self> {
        let mut sources: Vec<Arc<dyn ModuleSource>> = Vec::new();

        for entry in config.enabled_sources() {
            if sources.iter().any(|s| s.name() == entry.name) {
                bail!("source `{}` is configured twice", entry.name);
            }
            sources.push(create_source(entry, cwd, pool)?);
        }

        tracing::debug!("configured {} module sources", sources.len());
        Ok(SourceSet { sources })
    }

    /// Get a source by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ModuleSource>> {
        self.sources.iter().find(|s| s.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ModuleSource>> {
        self.sources.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Create a source for a config entry.
fn create_source(entry: &SourceEntry, cwd: &Path, pool: &ClientPool) -> Result<Arc<dyn ModuleSource>> {
    if entry.is_remote() {
        let endpoint = Url::parse(&entry.url)
            .with_context(|| format!("invalid url for source `{}`: {}", entry.name, entry.url))?;
        Ok(Arc::new(HttpSource::from_pool(&entry.name, endpoint, pool)?))
    } else {
        let path = Path::new(&entry.url);
        let root = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        Ok(Arc::new(LocalIndexSource::new(&entry.name, root)))
    }
}
