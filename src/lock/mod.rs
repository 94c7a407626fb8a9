//! The installed-module lock store.
//!
//! `ModuleLockStore` tracks which modules are installed and with which
//! dependency groups. Readers take an immutable snapshot and never wait on
//! disk I/O; writers are serialized and publish a new snapshot only after
//! the lock file has been written.

pub mod encode;
pub mod persist;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::core::{DependencyGroup, ModuleIdentity};

pub use encode::{LockFile, LOCK_VERSION};
pub use persist::{FileLockPersistence, LockPersistence};

/// Installed modules and their dependency groups.
pub type ModuleLockState = BTreeMap<ModuleIdentity, Vec<DependencyGroup>>;

/// Errors from the lock store.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file at {location} is corrupt")]
    CorruptState {
        location: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read lock file at {location}")]
    ReadFailure {
        location: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write lock file at {location}")]
    PersistenceFailure {
        location: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Thread-safe store of installed modules.
pub struct ModuleLockStore {
    persistence: Box<dyn LockPersistence>,
    snapshot: RwLock<Arc<ModuleLockState>>,
    writer: Mutex<()>,
}

impl ModuleLockStore {
    /// Create a store with an empty snapshot. Call `reload` to read
    /// existing state.
    pub fn new(persistence: impl LockPersistence + 'static) -> Self {
        ModuleLockStore {
            persistence: Box::new(persistence),
            snapshot: RwLock::new(Arc::new(ModuleLockState::new())),
            writer: Mutex::new(()),
        }
    }

    /// Create a store and load its state.
    pub async fn open(persistence: impl LockPersistence + 'static) -> Result<Self, LockError> {
        let store = Self::new(persistence);
        store.reload().await?;
        Ok(store)
    }

    /// Where the lock file lives.
    pub fn location(&self) -> String {
        self.persistence.location()
    }

    /// The current snapshot.
    pub fn modules(&self) -> Arc<ModuleLockState> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Check whether a module is installed.
    pub fn contains(&self, identity: &ModuleIdentity) -> bool {
        self.modules().contains_key(identity)
    }

    /// Re-read persisted state.
    ///
    /// A missing lock file yields an empty snapshot. An unreadable or
    /// invalid one fails and keeps the current snapshot.
    pub async fn reload(&self) -> Result<(), LockError> {
        let _guard = self.writer.lock().await;

        let bytes = self
            .persistence
            .load()
            .await
            .map_err(|source| LockError::ReadFailure {
                location: self.location(),
                source,
            })?;

        let state = match bytes {
            None => {
                tracing::debug!("no lock file at {}, starting empty", self.location());
                ModuleLockState::new()
            }
            Some(bytes) => LockFile::decode(&bytes)
                .and_then(LockFile::into_state)
                .map_err(|source| LockError::CorruptState {
                    location: self.location(),
                    source,
                })?,
        };

        self.publish(state);
        Ok(())
    }

    /// Record a module as installed, replacing any earlier entry for it.
    pub async fn add(
        &self,
        identity: ModuleIdentity,
        groups: Vec<DependencyGroup>,
    ) -> Result<(), LockError> {
        let _guard = self.writer.lock().await;

        let mut next = (*self.modules()).clone();
        // Remove first so the stored key takes the new spelling.
        next.remove(&identity);
        next.insert(identity, groups);

        self.persist(&next).await?;
        self.publish(next);
        Ok(())
    }

    /// Forget a module. Removing one that is not installed does nothing.
    pub async fn remove(&self, identity: &ModuleIdentity) -> Result<(), LockError> {
        let _guard = self.writer.lock().await;

        let current = self.modules();
        if !current.contains_key(identity) {
            tracing::debug!("{} is not installed, nothing to remove", identity);
            return Ok(());
        }

        let mut next = (*current).clone();
        next.remove(identity);

        self.persist(&next).await?;
        self.publish(next);
        Ok(())
    }

    /// Replace the whole state.
    pub async fn replace(&self, state: ModuleLockState) -> Result<(), LockError> {
        let _guard = self.writer.lock().await;

        self.persist(&state).await?;
        self.publish(state);
        Ok(())
    }

    async fn persist(&self, state: &ModuleLockState) -> Result<(), LockError> {
        let failure = |source| LockError::PersistenceFailure {
            location: self.location(),
            source,
        };

        let encoded = LockFile::from_state(state).encode().map_err(failure)?;
        self.persistence
            .save(encoded.as_bytes())
            .await
            .map_err(failure)
    }

    fn publish(&self, state: ModuleLockState) {
        let next = Arc::new(state);
        match self.snapshot.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModuleDependency;
    use crate::test_support::MemoryPersistence;
    use tempfile::TempDir;

    fn id(name: &str, version: &str) -> ModuleIdentity {
        ModuleIdentity::parse(name, version).unwrap()
    }

    fn groups() -> Vec<DependencyGroup> {
        vec![DependencyGroup::any(vec![
            ModuleDependency::parse("Logging", "^1").unwrap()
        ])]
    }

    #[tokio::test]
    async fn test_add_then_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("modules.lock");

        let store = ModuleLockStore::open(FileLockPersistence::new(&path))
            .await
            .unwrap();
        assert!(store.modules().is_empty());

        store.add(id("Chat", "1.0.0"), groups()).await.unwrap();
        assert!(path.exists());

        let reopened = ModuleLockStore::open(FileLockPersistence::new(&path))
            .await
            .unwrap();
        let modules = reopened.modules();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[&id("chat", "1.0.0")], groups());
    }

    #[tokio::test]
    async fn test_add_overwrites_existing_entry() {
        let store = ModuleLockStore::new(MemoryPersistence::new());

        store.add(id("Chat", "1.0.0"), vec![]).await.unwrap();
        store.add(id("chat", "1.0.0"), groups()).await.unwrap();

        let modules = store.modules();
        assert_eq!(modules.len(), 1);
        let (key, value) = modules.iter().next().unwrap();
        assert_eq!(key.name(), "chat");
        assert_eq!(value, &groups());
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let persistence = MemoryPersistence::new();
        let store = ModuleLockStore::new(persistence.clone());

        store.add(id("Chat", "1.0.0"), vec![]).await.unwrap();
        let saves = persistence.saves();

        store.remove(&id("Maps", "1.0.0")).await.unwrap();
        assert_eq!(store.modules().len(), 1);
        assert_eq!(persistence.saves(), saves);

        store.remove(&id("Chat", "1.0.0")).await.unwrap();
        assert!(store.modules().is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_are_immutable() {
        let store = ModuleLockStore::new(MemoryPersistence::new());
        let before = store.modules();

        store.add(id("Chat", "1.0.0"), vec![]).await.unwrap();

        assert!(before.is_empty());
        assert_eq!(store.modules().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_all_land() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("modules.lock");
        let store = Arc::new(ModuleLockStore::new(FileLockPersistence::new(&path)));

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .add(id(&format!("Module{n}"), "1.0.0"), vec![])
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.modules().len(), 16);

        let reopened = ModuleLockStore::open(FileLockPersistence::new(&path))
            .await
            .unwrap();
        assert_eq!(reopened.modules().len(), 16);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_snapshot() {
        let persistence = MemoryPersistence::new();
        let store = ModuleLockStore::new(persistence.clone());
        store.add(id("Chat", "1.0.0"), vec![]).await.unwrap();

        persistence.fail_saves(true);
        let err = store.add(id("Maps", "1.0.0"), vec![]).await.unwrap_err();
        assert!(matches!(err, LockError::PersistenceFailure { .. }));

        let modules = store.modules();
        assert_eq!(modules.len(), 1);
        assert!(!store.contains(&id("Maps", "1.0.0")));
    }

    #[tokio::test]
    async fn test_corrupt_file_keeps_snapshot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("modules.lock");
        let store = ModuleLockStore::new(FileLockPersistence::new(&path));
        store.add(id("Chat", "1.0.0"), vec![]).await.unwrap();

        std::fs::write(&path, "this is [not toml").unwrap();
        let err = store.reload().await.unwrap_err();
        assert!(matches!(err, LockError::CorruptState { .. }));
        assert_eq!(store.modules().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_swaps_everything() {
        let store = ModuleLockStore::new(MemoryPersistence::new());
        store.add(id("Chat", "1.0.0"), vec![]).await.unwrap();

        let mut state = ModuleLockState::new();
        state.insert(id("Maps", "2.0.0"), groups());
        store.replace(state.clone()).await.unwrap();

        assert_eq!(*store.modules(), state);
    }
}
