//! Where the lock store keeps its bytes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::util::fs;

/// Storage backend for the lock file.
#[async_trait]
pub trait LockPersistence: Send + Sync {
    /// Where the bytes live, for messages.
    fn location(&self) -> String;

    /// Read the stored bytes; `None` when nothing was ever stored.
    async fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored bytes. Either all bytes land or none do.
    async fn save(&self, contents: &[u8]) -> Result<()>;
}

/// Lock file on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileLockPersistence {
    path: PathBuf,
}

impl FileLockPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileLockPersistence { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LockPersistence for FileLockPersistence {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Option<Vec<u8>>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || fs::read_optional(&path))
            .await
            .context("lock file reader task failed")?
    }

    async fn save(&self, contents: &[u8]) -> Result<()> {
        let path = self.path.clone();
        let contents = contents.to_vec();
        tokio::task::spawn_blocking(move || fs::atomic_write(&path, &contents))
            .await
            .context("lock file writer task failed")?
    }
}
